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
    // CPG_WEBHOOK_SECRET and CPG_ADMIN_TOKEN are left out on purpose
    const DISPLAY_ENVS: [&str; 13] = [
        "RUST_LOG",
        "CPG_HOST",
        "CPG_PORT",
        "CPG_DATABASE_URL",
        "CPG_RECEIVING_ADDRESS",
        "CPG_ACCEPTED_TOKENS",
        "CPG_CHAIN_ID",
        "CPG_SIGNATURE_HEADER",
        "CPG_MIN_CONFIRMATIONS",
        "CPG_ORDER_TTL_MINUTES",
        "CPG_AMOUNT_TOLERANCE",
        "CPG_SWEEP_INTERVAL_SECS",
        "CPG_WEBHOOK_TIMEOUT_SECS",
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
