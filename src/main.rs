fn main() {
    if let Err(e) = clan_drop_webhook_lib::run() {
        eprintln!("clan-drop-webhook: {}", e);
        std::process::exit(1);
    }
}
