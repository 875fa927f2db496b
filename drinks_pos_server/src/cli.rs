use std::{env, env::VarError};

/// There's no real CLI for the server, so just do quick 'n dirty
pub fn handle_command_line_args() -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        // We don't expect any CLI args, so always print the help
        display_readme();
        display_envs();
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_envs() {
    // Be explicit about which envars to print, so as to avoid accidentally exposing secrets
    const DISPLAY_ENVS: [&str; 17] = [
        "RUST_LOG",
        "DPOS_HOST",
        "DPOS_PORT",
        "DPOS_DATABASE_URL",
        "DPOS_SESSION_TTL",
        "DPOS_USE_X_FORWARDED_FOR",
        "DPOS_USE_FORWARDED",
        "DPOS_STRICT_ITEM_LOOKUP",
        "DPOS_READER_POLL_ATTEMPTS",
        "DPOS_READER_POLL_INTERVAL",
        "DPOS_EVENT_BUFFER_SIZE",
        "DPOS_SKIP_READER_SYNC",
        "DPOS_WEBHOOK_HMAC_CHECKS",
        "DPOS_WEBHOOK_IP_WHITELIST",
        "DPOS_SUMUP_MERCHANT_CODE",
        "DPOS_SUMUP_API_URL",
        "DPOS_SUMUP_RETURN_URL",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
