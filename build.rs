fn main() {
    println!("cargo:rerun-if-changed=config/ESPConfig.json");

    // Host builds need no ESP-IDF environment.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
