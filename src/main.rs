use consolebind::bot;
use consolebind::console::DisconnectedConsole;
use std::sync::Arc;

fn main() {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to build Tokio runtime");

    // The web-console session bridge is attached by the hosting layer; on its
    // own the binary runs with every server reported as disconnected.
    if let Err(e) = runtime.block_on(bot::run(Arc::new(DisconnectedConsole::new()))) {
        eprintln!("Error starting bot: {}", e);
        std::process::exit(1);
    }
}
