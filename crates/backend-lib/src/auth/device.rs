// ============================
// crates/backend-lib/src/auth/device.rs
// ============================
//! Device fingerprint derived from the `User-Agent` header.
//!
//! This is a heuristic used for audit rows only. It never takes part in an
//! authentication decision.

use std::fmt;

/// Device family, brand and model as far as they can be told from the user agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub family: String,
    pub brand: Option<String>,
    pub model: Option<String>,
}

/// Model prefixes of common Android vendors
const ANDROID_BRANDS: &[(&str, &str)] = &[
    ("SM-", "Samsung"),
    ("GT-", "Samsung"),
    ("SAMSUNG", "Samsung"),
    ("Pixel", "Google"),
    ("Nexus", "Google"),
    ("Redmi", "Xiaomi"),
    ("Mi ", "Xiaomi"),
    ("POCO", "Xiaomi"),
    ("HUAWEI", "Huawei"),
    ("Honor", "Huawei"),
    ("moto", "Motorola"),
    ("Moto", "Motorola"),
    ("ONEPLUS", "OnePlus"),
    ("OnePlus", "OnePlus"),
    ("Nokia", "Nokia"),
    ("LM-", "LG"),
    ("CPH", "Oppo"),
    ("vivo", "Vivo"),
];

impl DeviceInfo {
    /// Unknown device
    pub fn other() -> Self {
        Self {
            family: "Other".to_string(),
            brand: None,
            model: None,
        }
    }

    fn apple(model: &str) -> Self {
        Self {
            family: model.to_string(),
            brand: Some("Apple".to_string()),
            model: Some(model.to_string()),
        }
    }

    pub fn from_user_agent(user_agent: &str) -> Self {
        let lower = user_agent.to_ascii_lowercase();

        if ["bot", "crawler", "spider", "slurp"].iter().any(|needle| lower.contains(needle)) {
            return Self {
                family: "Spider".to_string(),
                brand: Some("Spider".to_string()),
                model: Some("Desktop".to_string()),
            };
        }
        if user_agent.contains("iPhone") {
            return Self::apple("iPhone");
        }
        if user_agent.contains("iPad") {
            return Self::apple("iPad");
        }
        if user_agent.contains("iPod") {
            return Self::apple("iPod");
        }
        if lower.contains("android") {
            return Self::android(user_agent);
        }
        if user_agent.contains("Macintosh") {
            return Self::apple("Mac");
        }
        Self::other()
    }

    /// `Mozilla/5.0 (Linux; Android 10; SM-G960F Build/QP1A) ...`
    fn android(user_agent: &str) -> Self {
        let model = user_agent
            .split_once('(')
            .and_then(|(_, rest)| rest.split_once(')'))
            .and_then(|(platform, _)| {
                let mut parts = platform.split(';').map(str::trim);
                parts.find(|part| part.starts_with("Android"))?;
                parts.find(|part| !part.is_empty() && !part.starts_with("wv"))
            })
            .map(|part| part.split(" Build/").next().unwrap_or(part).trim())
            // Reduced user agents send a single "K" instead of the model
            .filter(|model| !model.is_empty() && *model != "K")
            .map(str::to_string);

        let Some(model) = model else {
            return Self {
                family: "Generic Smartphone".to_string(),
                brand: Some("Generic".to_string()),
                model: Some("Smartphone".to_string()),
            };
        };

        let brand = ANDROID_BRANDS
            .iter()
            .find(|(prefix, _)| model.starts_with(prefix))
            .map(|(_, brand)| (*brand).to_string());

        let family = match &brand {
            Some(brand) if !model.starts_with(brand.as_str()) => format!("{brand} {model}"),
            _ => model.clone(),
        };

        Self {
            family,
            brand,
            model: Some(model),
        }
    }
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.family)?;
        for part in [&self.brand, &self.model].into_iter().flatten() {
            write!(f, " {part}")?;
        }
        Ok(())
    }
}
