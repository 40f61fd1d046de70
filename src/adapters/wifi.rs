//! WiFi station helper.
//!
//! Association is outside the sync engine: the binary calls [`connect`]
//! once at boot and blocks until the station has an IP.
//!
//! ## cfg gating
//!
//! - **`target_os = "espidf"`**: `esp_idf_svc::wifi::BlockingWifi` over `EspWifi`.
//! - **all other targets**: the host is already on a network; only the
//!   credentials are validated and logged.

use core::fmt;
use log::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectivityError {
    NoCredentials,
    InvalidSsid,
    InvalidPassword,
    ConnectionFailed,
}

impl fmt::Display for ConnectivityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no WiFi credentials configured"),
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => write!(f, "password invalid (must be 8-64 bytes for WPA2, or empty for open)"),
            Self::ConnectionFailed => write!(f, "WiFi connection failed"),
        }
    }
}

impl std::error::Error for ConnectivityError {}

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

pub fn validate_ssid(ssid: &str) -> Result<(), ConnectivityError> {
    if ssid.is_empty() || ssid.len() > 32 || !is_printable_ascii(ssid) {
        return Err(ConnectivityError::InvalidSsid);
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), ConnectivityError> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < 8 || password.len() > 64 {
        return Err(ConnectivityError::InvalidPassword);
    }
    Ok(())
}

/// Validated station credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StationCredentials {
    ssid: heapless::String<32>,
    password: heapless::String<64>,
}

impl StationCredentials {
    pub fn new(ssid: &str, password: &str) -> Result<Self, ConnectivityError> {
        if ssid.is_empty() {
            return Err(ConnectivityError::NoCredentials);
        }
        validate_ssid(ssid)?;
        validate_password(password)?;
        let mut creds = Self {
            ssid: heapless::String::new(),
            password: heapless::String::new(),
        };
        creds.ssid.push_str(ssid).map_err(|_| ConnectivityError::InvalidSsid)?;
        creds
            .password
            .push_str(password)
            .map_err(|_| ConnectivityError::InvalidPassword)?;
        Ok(creds)
    }

    pub fn ssid(&self) -> &str {
        &self.ssid
    }

    pub fn is_open(&self) -> bool {
        self.password.is_empty()
    }
}

// ───────────────────────────────────────────────────────────────
// Station bring-up
// ───────────────────────────────────────────────────────────────

/// Keeps the driver alive for the lifetime of the firmware.
pub struct Station {
    #[cfg(target_os = "espidf")]
    _wifi: esp_idf_svc::wifi::BlockingWifi<esp_idf_svc::wifi::EspWifi<'static>>,
}

#[cfg(target_os = "espidf")]
pub fn connect(
    creds: &StationCredentials,
    modem: esp_idf_svc::hal::modem::Modem,
) -> Result<Station, ConnectivityError> {
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_svc::nvs::EspDefaultNvsPartition;
    use esp_idf_svc::wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi};
    use log::{error, warn};

    let fail = |what: &str, e: esp_idf_svc::sys::EspError| {
        error!("WiFi {}: {}", what, e);
        ConnectivityError::ConnectionFailed
    };

    let sysloop = EspSystemEventLoop::take().map_err(|e| fail("event loop", e))?;
    let nvs = EspDefaultNvsPartition::take().ok();
    let esp = EspWifi::new(modem, sysloop.clone(), nvs).map_err(|e| fail("driver", e))?;
    let mut wifi = BlockingWifi::wrap(esp, sysloop).map_err(|e| fail("wrap", e))?;

    let config = Configuration::Client(ClientConfiguration {
        ssid: creds
            .ssid
            .as_str()
            .try_into()
            .map_err(|_| ConnectivityError::InvalidSsid)?,
        password: creds
            .password
            .as_str()
            .try_into()
            .map_err(|_| ConnectivityError::InvalidPassword)?,
        auth_method: if creds.is_open() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        },
        ..Default::default()
    });
    wifi.set_configuration(&config).map_err(|e| fail("config", e))?;
    wifi.start().map_err(|e| fail("start", e))?;

    info!("Connecting to WIFI '{}'...", creds.ssid());
    loop {
        match wifi.connect().and_then(|()| wifi.wait_netif_up()) {
            Ok(()) => break,
            Err(e) => {
                warn!("Waiting WIFI... ({})", e);
                esp_idf_svc::hal::delay::FreeRtos::delay_ms(500);
            }
        }
    }

    if let Ok(ip) = wifi.wifi().sta_netif().get_ip_info() {
        info!("Connected to WIFI, IP {}", ip.ip);
    }
    Ok(Station { _wifi: wifi })
}

#[cfg(not(target_os = "espidf"))]
pub fn connect(creds: &StationCredentials) -> Result<Station, ConnectivityError> {
    info!("WiFi(sim): using host network (SSID '{}' ignored)", creds.ssid());
    Ok(Station {})
}
