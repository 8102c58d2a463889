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
    const DISPLAY_ENVS: [&str; 19] = [
        "RUST_LOG",
        "MPS_HOST",
        "MPS_PORT",
        "MPS_DATABASE_URL",
        "MPS_DB_MAX_CONNECTIONS",
        "MPS_EVENT_BUFFER_SIZE",
        "MPS_FEED_CAPACITY",
        "MPS_ALERT_DURATION_MS",
        "MPS_ALERT_MESSAGE",
        "MPS_RECONNECT_INITIAL_MS",
        "MPS_RECONNECT_MAX_MS",
        "MPS_RECONNECT_MAX_ATTEMPTS",
        "MPS_MERCHANT_SCOPED_FEED",
        "MPS_PULSE_IDLE_TIMEOUT_SECS",
        "MPS_MAX_PULSE_LISTENERS",
        "MPS_TAX_RATE_BPS",
        "MPS_DELIVERY_FEE",
        "MPS_FREE_DELIVERY_THRESHOLD",
        "MPS_REFUND_FEE_BPS",
    ];

    println!("Current environment values:");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}
