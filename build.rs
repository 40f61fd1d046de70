fn main() {
    println!("cargo:rerun-if-env-changed=NOSYNA_WIFI_SSID");
    println!("cargo:rerun-if-env-changed=NOSYNA_WIFI_PASSWORD");
    println!("cargo:rerun-if-env-changed=NOSYNA_MQTT_HOST");
    println!("cargo:rerun-if-env-changed=NOSYNA_MQTT_PORT");
    println!("cargo:rerun-if-env-changed=NOSYNA_MQTT_USER");
    println!("cargo:rerun-if-env-changed=NOSYNA_MQTT_PASSWORD");

    #[cfg(feature = "espidf")]
    embuild::espidf::sysenv::output();
}
