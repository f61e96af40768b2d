//! Build script for the ESP32 echo server
//!
//! Sets up the ESP-IDF environment and bakes the WiFi credentials and LED pin
//! into the firmware.

const SETTINGS: [(&str, &str, &str); 3] = [
    ("WIFI_SSID", "WS_ECHO_WIFI_SSID", ""),
    ("WIFI_PASS", "WS_ECHO_WIFI_PASS", ""),
    ("LED_GPIO", "WS_ECHO_LED_GPIO", "2"),
];

fn main() {
    // Output ESP-IDF environment configuration
    // This is required for the esp-idf-svc crate to find the IDF toolchain
    embuild::espidf::sysenv::output();

    for (var, exported, default) in SETTINGS {
        println!("cargo:rerun-if-env-changed={}", var);
        let value = std::env::var(var).unwrap_or_else(|_| default.to_string());
        if value.is_empty() && var == "WIFI_SSID" {
            println!("cargo:warning=WIFI_SSID is not set; the firmware will halt at boot");
        }
        println!("cargo:rustc-env={}={}", exported, value);
    }
}
