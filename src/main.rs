use aether::{logger, uci};

fn main() {
    logger::init();
    uci::run();
}
