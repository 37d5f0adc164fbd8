//! Peer identity: opaque ids, deterministic display names, and UA sniffing.
//!
//! Display names are a pure function of [`PeerId`] so that a client
//! reconnecting with the same `peerid` cookie always sees the same
//! human-readable name (§8, scenario S6).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque, URL-safe, collision-resistant peer identifier.
pub type PeerId = String;

/// Mint a fresh [`PeerId`] for a client with no existing cookie.
pub fn mint_peer_id() -> PeerId {
    Uuid::new_v4().to_string()
}

/// Device category surfaced to other peers.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Mobile,
    Tablet,
    Laptop,
    Desktop,
}

/// Device descriptor parsed from a `User-Agent` header.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    #[serde(rename = "type")]
    pub kind: DeviceType,
    pub model: String,
    pub os: String,
    pub browser: String,
}

/// The name a peer is known by: a deterministic two-word display name plus
/// a human device label and the structured [`Device`] it was derived from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayIdentity {
    pub display_name: String,
    pub device_name: String,
    pub device: Device,
}

/// Derive the deterministic display name for a [`PeerId`].
///
/// Folds the id's UTF-16 code units into a 32-bit signed hash (identical to
/// the JS `String.prototype` folding hash used by the reference
/// implementation), then drives a seeded LCG to pick one color and one
/// animal from the fixed wordlists below.
pub fn derive_display_name(id: &str) -> String {
    let seed = fold_hash(id);
    let mut rng = SeededRandom::new(seed);
    let color = COLORS[rng.next_index(COLORS.len())];
    let animal = ANIMALS[rng.next_index(ANIMALS.len())];
    format!("{} {}", capitalize(color), capitalize(animal))
}

/// JS-style `h = ((h << 5) - h + c) | 0` folding hash over UTF-16 code units.
fn fold_hash(s: &str) -> i32 {
    let mut h: i32 = 0;
    for c in s.encode_utf16() {
        h = h
            .wrapping_shl(5)
            .wrapping_sub(h)
            .wrapping_add(c as i32);
    }
    h
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// The linear-congruential generator used by `unique-names-generator` to
/// turn a numeric seed into a reproducible sequence of dictionary indices.
struct SeededRandom {
    state: f64,
}

impl SeededRandom {
    fn new(seed: i32) -> Self {
        // The reference generator seeds on a non-negative magnitude.
        Self {
            state: (seed as i64).unsigned_abs() as f64,
        }
    }

    fn next_index(&mut self, len: usize) -> usize {
        self.state = (self.state * 9301.0 + 49297.0) % 233280.0;
        let fraction = self.state / 233280.0;
        ((fraction * len as f64) as usize).min(len - 1)
    }
}

/// Parse a `User-Agent` header into a [`Device`] descriptor using coarse,
/// widely-applicable heuristics. Any field that can't be determined is left
/// empty; an entirely blank UA yields `device_name == "Unknown Device"`.
pub fn parse_user_agent(ua: &str) -> Device {
    let os = detect_os(ua);
    let browser = detect_browser(ua);
    let model = detect_model(ua);
    let kind = detect_device_type(ua);

    Device {
        kind,
        model,
        os,
        browser,
    }
}

/// Build the full [`DisplayIdentity`] for a peer from its id and UA string.
pub fn build_identity(id: &str, ua: &str) -> DisplayIdentity {
    let device = parse_user_agent(ua);
    let device_name = device_name(&device);
    DisplayIdentity {
        display_name: derive_display_name(id),
        device_name,
        device,
    }
}

fn device_name(device: &Device) -> String {
    let os = shorten_os(&device.os);
    let label = if !device.model.is_empty() {
        device.model.clone()
    } else if !device.browser.is_empty() {
        device.browser.clone()
    } else {
        String::new()
    };

    match (os.is_empty(), label.is_empty()) {
        (true, true) => "Unknown Device".to_string(),
        (true, false) => label,
        (false, true) => os,
        (false, false) => format!("{os} {label}"),
    }
}

fn shorten_os(os: &str) -> String {
    if os == "Mac OS" {
        "Mac".to_string()
    } else {
        os.to_string()
    }
}

fn detect_os(ua: &str) -> String {
    let lower = ua.to_lowercase();
    if lower.contains("windows") {
        "Windows".to_string()
    } else if lower.contains("mac os") || lower.contains("macintosh") {
        "Mac OS".to_string()
    } else if lower.contains("android") {
        "Android".to_string()
    } else if lower.contains("iphone") || lower.contains("ipad") || lower.contains("ios") {
        "iOS".to_string()
    } else if lower.contains("linux") {
        "Linux".to_string()
    } else {
        String::new()
    }
}

fn detect_browser(ua: &str) -> String {
    let lower = ua.to_lowercase();
    if lower.contains("edg/") {
        "Edge".to_string()
    } else if lower.contains("opr/") || lower.contains("opera") {
        "Opera".to_string()
    } else if lower.contains("firefox") {
        "Firefox".to_string()
    } else if lower.contains("chrome") {
        "Chrome".to_string()
    } else if lower.contains("safari") {
        "Safari".to_string()
    } else {
        String::new()
    }
}

fn detect_model(ua: &str) -> String {
    if let Some(start) = ua.find("iPhone") {
        return ua[start..].split([';', ')']).next().unwrap_or("iPhone").trim().to_string();
    }
    if let Some(start) = ua.find("iPad") {
        return ua[start..].split([';', ')']).next().unwrap_or("iPad").trim().to_string();
    }
    // Android device models appear after "; " and before " Build/" or ")".
    if let Some(idx) = ua.find("Android") {
        let tail = &ua[idx..];
        if let Some(semi) = tail.find(';') {
            let after = &tail[semi + 1..];
            let model = after.split([';', ')']).next().unwrap_or("").trim();
            if !model.is_empty() {
                return model.to_string();
            }
        }
    }
    String::new()
}

fn detect_device_type(ua: &str) -> DeviceType {
    let lower = ua.to_lowercase();
    if lower.contains("ipad") || (lower.contains("android") && !lower.contains("mobile")) {
        DeviceType::Tablet
    } else if lower.contains("iphone") || (lower.contains("android") && lower.contains("mobile")) || lower.contains("mobile") {
        DeviceType::Mobile
    } else if lower.contains("macintosh") || lower.contains("windows") || lower.contains("linux") {
        DeviceType::Desktop
    } else {
        DeviceType::Desktop
    }
}

/// Fixed color wordlist (a subset of `unique-names-generator`'s `colors`
/// dictionary). Selection is deterministic given a seed; the exact set of
/// words only needs to match across servers built from this same spec.
pub const COLORS: &[&str] = &[
    "almond", "amber", "amethyst", "apricot", "aqua", "azure", "beige", "bronze", "burgundy",
    "camel", "caramel", "carmine", "cerise", "cerulean", "charcoal", "chartreuse", "chestnut",
    "chocolate", "cinnamon", "claret", "coffee", "copper", "coral", "cream", "crimson", "cyan",
    "denim", "ebony", "emerald", "fuchsia", "gold", "gray", "green", "indigo", "ivory", "jade",
    "khaki", "lavender", "lemon", "lilac", "lime", "magenta", "maroon", "mauve", "mint",
    "mustard", "navy", "ocher", "olive", "onyx", "orange", "orchid", "peach", "pearl",
    "periwinkle", "pink", "plum", "purple", "red", "rose", "ruby", "rust", "saffron", "salmon",
    "sapphire", "scarlet", "sienna", "silver", "slate", "tan", "teal", "turquoise", "violet",
    "viridian", "white", "yellow",
];

/// Fixed animal wordlist (a subset of `unique-names-generator`'s `animals`
/// dictionary).
pub const ANIMALS: &[&str] = &[
    "alpaca", "antelope", "badger", "bat", "bear", "beaver", "bison", "boar", "buffalo",
    "camel", "capybara", "caribou", "cat", "cheetah", "chinchilla", "chipmunk", "cobra",
    "cougar", "coyote", "crane", "crocodile", "crow", "deer", "dingo", "dog", "dolphin",
    "donkey", "dove", "eagle", "elephant", "elk", "falcon", "ferret", "finch", "fox", "frog",
    "gazelle", "gecko", "giraffe", "goat", "goose", "gorilla", "hamster", "hare", "hawk",
    "hedgehog", "heron", "hippo", "hornet", "horse", "hyena", "ibex", "iguana", "impala",
    "jackal", "jaguar", "kangaroo", "koala", "lemur", "leopard", "lion", "llama", "lynx",
    "magpie", "manatee", "mantis", "marmot", "meerkat", "mink", "mole", "mongoose", "moose",
    "moth", "mouse", "mule", "newt", "ocelot", "octopus", "okapi", "orca", "osprey", "ostrich",
    "otter", "owl", "ox", "panda", "panther", "parrot", "peacock", "pelican", "penguin",
    "pheasant", "pigeon", "platypus", "pony", "porcupine", "possum", "puffin", "puma", "quail",
    "rabbit", "raccoon", "ram", "rat", "raven", "reindeer", "rhino", "robin", "salamander",
    "seal", "shark", "sheep", "shrew", "skunk", "sloth", "snail", "snake", "sparrow", "squid",
    "squirrel", "stoat", "stork", "swan", "tapir", "tiger", "toad", "toucan", "turkey",
    "turtle", "viper", "vole", "vulture", "wallaby", "walrus", "weasel", "whale", "wolf",
    "wolverine", "wombat", "woodpecker", "wren", "yak", "zebra",
];
