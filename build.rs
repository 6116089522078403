fn main() {
    println!("cargo:rerun-if-changed=src/adapters/zigbee/bindings.h");

    // Host builds (tests, simulation) have no ESP-IDF environment to emit.
    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
