mod helpers;

mod auth;
mod callback;
mod events;
mod items;
mod purchases;
mod readers;
mod users;
