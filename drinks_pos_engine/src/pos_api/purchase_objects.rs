use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A reference to a catalog item in a purchase request. Clients may send either the bare id, or an item object of
/// which only the `id` is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ItemRef {
    Id(Uuid),
    Item { id: Uuid },
}

impl ItemRef {
    pub fn id(&self) -> Uuid {
        match self {
            ItemRef::Id(id) => *id,
            ItemRef::Item { id } => *id,
        }
    }
}

impl From<Uuid> for ItemRef {
    fn from(id: Uuid) -> Self {
        ItemRef::Id(id)
    }
}

/// The body of a purchase request. Exactly one of `items` and `amount` must be given.
///
/// `payment_type` is kept as a string here so that an unknown value can be reported as an invalid request rather
/// than a deserialization failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRequest {
    #[serde(default)]
    pub items: Option<Vec<ItemRef>>,
    pub payment_type: String,
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub reader_id: Option<String>,
}

impl PurchaseRequest {
    pub fn for_items<I: IntoIterator<Item = Uuid>>(items: I, payment_type: &str) -> Self {
        Self {
            items: Some(items.into_iter().map(ItemRef::from).collect()),
            payment_type: payment_type.to_string(),
            ..Default::default()
        }
    }

    pub fn for_amount(amount: i64, payment_type: &str) -> Self {
        Self { amount: Some(amount), payment_type: payment_type.to_string(), ..Default::default() }
    }

    pub fn with_reader<S: Into<String>>(mut self, reader_id: S) -> Self {
        self.reader_id = Some(reader_id.into());
        self
    }

    /// An empty item list counts as "no items", matching how clients send `"items": []` alongside an amount.
    pub fn item_ids(&self) -> Option<Vec<Uuid>> {
        match &self.items {
            Some(items) if !items.is_empty() => Some(items.iter().map(ItemRef::id).collect()),
            _ => None,
        }
    }
}
