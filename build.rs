fn main() {
    // The ESP-IDF link environment only exists when cross-compiling for the
    // device; host builds (tests, simulation) have nothing to forward.
    if std::env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("espidf") {
        embuild::espidf::sysenv::output();
    }
}
