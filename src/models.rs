//! Data models for the escalation tracker.
//!
//! This module contains the closed indicator taxonomy (categories and
//! indicators), the threat level bands, and the bounded analysis log.

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

/// Thematic grouping of indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Military,
    Maritime,
    Aviation,
    Cyber,
    Diplomacy,
}

impl Category {
    /// All categories in display order.
    pub const ALL: [Category; 5] = [
        Category::Military,
        Category::Maritime,
        Category::Aviation,
        Category::Cyber,
        Category::Diplomacy,
    ];

    /// Wire key used in state documents and model payloads.
    pub fn key(&self) -> &'static str {
        match self {
            Category::Military => "military",
            Category::Maritime => "maritime",
            Category::Aviation => "aviation",
            Category::Cyber => "cyber",
            Category::Diplomacy => "diplomacy",
        }
    }

    /// Dashboard tab title.
    pub fn title(&self) -> &'static str {
        match self {
            Category::Military => "Military",
            Category::Maritime => "Economy & Maritime",
            Category::Aviation => "Aviation",
            Category::Cyber => "Cyber & SIGINT",
            Category::Diplomacy => "Government & Diplomacy",
        }
    }

    /// Indicators belonging to this category, in declaration order.
    pub fn indicators(&self) -> &'static [Indicator] {
        use Indicator::*;
        match self {
            Category::Maritime => &[WarRisk, OilAnomaly, Polymarket, RialCollapse, KhargEvac],
            Category::Aviation => &[IsraeliFleet, SaudiEscat, IranCancels, VipFlights],
            Category::Military => &[
                UssGeorgia,
                TankerBridge,
                BomberDeploy,
                BunkerSealing,
                IrgcUnderground,
            ],
            Category::Cyber => &[
                GpsJamming,
                InternetBlackout,
                ProxyChatter,
                SigintSpikes,
                CyberWaves,
            ],
            Category::Diplomacy => &[EnvoyWatch, EmbassyEvac, HospitalAlert, SummitDeception],
        }
    }

    /// Look up an indicator of this category by its wire key.
    pub fn indicator(&self, key: &str) -> Option<Indicator> {
        self.indicators().iter().copied().find(|i| i.key() == key)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "military" => Ok(Category::Military),
            "maritime" => Ok(Category::Maritime),
            "aviation" => Ok(Category::Aviation),
            "cyber" => Ok(Category::Cyber),
            "diplomacy" => Ok(Category::Diplomacy),
            other => Err(other.to_string()),
        }
    }
}

/// A single tracked signal. The set is closed; adding a variant without a
/// category, key, label and baseline fails to compile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Indicator {
    // Maritime / economy
    WarRisk,
    OilAnomaly,
    Polymarket,
    RialCollapse,
    KhargEvac,
    // Aviation
    IsraeliFleet,
    SaudiEscat,
    IranCancels,
    VipFlights,
    // Military
    UssGeorgia,
    TankerBridge,
    BomberDeploy,
    BunkerSealing,
    IrgcUnderground,
    // Cyber / SIGINT
    GpsJamming,
    InternetBlackout,
    ProxyChatter,
    SigintSpikes,
    CyberWaves,
    // Diplomacy
    EnvoyWatch,
    EmbassyEvac,
    HospitalAlert,
    SummitDeception,
}

impl Indicator {
    /// Number of declared indicators.
    pub const COUNT: usize = 23;

    /// Every indicator, in storage order.
    pub const ALL: [Indicator; Indicator::COUNT] = {
        use Indicator::*;
        [
            WarRisk,
            OilAnomaly,
            Polymarket,
            RialCollapse,
            KhargEvac,
            IsraeliFleet,
            SaudiEscat,
            IranCancels,
            VipFlights,
            UssGeorgia,
            TankerBridge,
            BomberDeploy,
            BunkerSealing,
            IrgcUnderground,
            GpsJamming,
            InternetBlackout,
            ProxyChatter,
            SigintSpikes,
            CyberWaves,
            EnvoyWatch,
            EmbassyEvac,
            HospitalAlert,
            SummitDeception,
        ]
    };

    /// Storage slot of this indicator.
    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn category(&self) -> Category {
        use Indicator::*;
        match self {
            WarRisk | OilAnomaly | Polymarket | RialCollapse | KhargEvac => Category::Maritime,
            IsraeliFleet | SaudiEscat | IranCancels | VipFlights => Category::Aviation,
            UssGeorgia | TankerBridge | BomberDeploy | BunkerSealing | IrgcUnderground => {
                Category::Military
            }
            GpsJamming | InternetBlackout | ProxyChatter | SigintSpikes | CyberWaves => {
                Category::Cyber
            }
            EnvoyWatch | EmbassyEvac | HospitalAlert | SummitDeception => Category::Diplomacy,
        }
    }

    /// Wire key, unique within the category.
    pub fn key(&self) -> &'static str {
        use Indicator::*;
        match self {
            WarRisk => "warRisk",
            OilAnomaly => "oilAnomaly",
            Polymarket => "polymarket",
            RialCollapse => "rialCollapse",
            KhargEvac => "khargEvac",
            IsraeliFleet => "israeliFleet",
            SaudiEscat => "saudiEscat",
            IranCancels => "iranCancels",
            VipFlights => "vipFlights",
            UssGeorgia => "ussGeorgia",
            TankerBridge => "tankerBridge",
            BomberDeploy => "bomberDeploy",
            BunkerSealing => "bunkerSealing",
            IrgcUnderground => "irgcUnderground",
            GpsJamming => "gpsJamming",
            InternetBlackout => "internetBlackout",
            ProxyChatter => "proxyChatter",
            SigintSpikes => "sigintSpikes",
            CyberWaves => "cyberWaves",
            EnvoyWatch => "envoyWatch",
            EmbassyEvac => "embassyEvac",
            HospitalAlert => "hospitalAlert",
            SummitDeception => "summitDeception",
        }
    }

    /// Human-readable label.
    pub fn label(&self) -> &'static str {
        use Indicator::*;
        match self {
            WarRisk => "Maritime war-risk insurance",
            OilAnomaly => "Oil price anomaly",
            Polymarket => "Prediction-market \"smart money\"",
            RialCollapse => "Iranian rial collapse",
            KhargEvac => "Kharg Island evacuation",
            IsraeliFleet => "El Al fleet evacuation",
            SaudiEscat => "Saudi ESCAT procedure",
            IranCancels => "Iranian flight cancellations",
            VipFlights => "VIP flights",
            UssGeorgia => "USS Georgia",
            TankerBridge => "Tanker air bridge",
            BomberDeploy => "B-52 bomber deployment",
            BunkerSealing => "Bunker sealing",
            IrgcUnderground => "IRGC leadership underground",
            GpsJamming => "GPS jamming",
            InternetBlackout => "Internet blackouts",
            ProxyChatter => "Proxy chatter",
            SigintSpikes => "SIGINT spikes",
            CyberWaves => "Cyber attack waves",
            EnvoyWatch => "Envoy aircraft watch",
            EmbassyEvac => "Embassy evacuations",
            HospitalAlert => "Hospital alert level",
            SummitDeception => "Strategic summit deception",
        }
    }

    /// Default baseline value for a fresh snapshot.
    pub fn baseline(&self) -> f64 {
        use Indicator::*;
        match self {
            WarRisk => 40.0,
            OilAnomaly => 20.0,
            Polymarket => 35.0,
            RialCollapse => 50.0,
            KhargEvac => 10.0,
            IsraeliFleet => 15.0,
            SaudiEscat => 5.0,
            IranCancels => 30.0,
            VipFlights => 25.0,
            UssGeorgia => 60.0,
            TankerBridge => 45.0,
            BomberDeploy => 30.0,
            BunkerSealing => 10.0,
            IrgcUnderground => 20.0,
            GpsJamming => 70.0,
            InternetBlackout => 15.0,
            ProxyChatter => 55.0,
            SigintSpikes => 40.0,
            CyberWaves => 30.0,
            EnvoyWatch => 10.0,
            EmbassyEvac => 5.0,
            HospitalAlert => 20.0,
            SummitDeception => 40.0,
        }
    }

    /// Values above this are shown as hot on the dashboard.
    pub fn is_hot(value: f64) -> bool {
        value > 70.0
    }
}

impl fmt::Display for Indicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.category().key(), self.key())
    }
}

/// Coarse classification of the escalation score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreatLevel {
    /// Quiet readings
    Baseline,
    /// Heightened but below the war-window cutoff
    Elevated,
    /// War window detected
    Critical,
}

impl fmt::Display for ThreatLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ThreatLevel::Baseline => write!(f, "Baseline"),
            ThreatLevel::Elevated => write!(f, "Elevated"),
            ThreatLevel::Critical => write!(f, "Critical"),
        }
    }
}

impl ThreatLevel {
    /// Returns an emoji representation of the level.
    pub fn emoji(&self) -> &'static str {
        match self {
            ThreatLevel::Baseline => "🟢",
            ThreatLevel::Elevated => "🟠",
            ThreatLevel::Critical => "🔴",
        }
    }

    /// Dashboard headline for this level.
    pub fn headline(&self) -> &'static str {
        match self {
            ThreatLevel::Critical => "WAR WINDOW DETECTED",
            _ => "SURVEILLANCE BASELINE",
        }
    }
}

/// Bounded, newest-first log of analysis events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisLog {
    capacity: usize,
    entries: VecDeque<String>,
}

impl AnalysisLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::new(),
        }
    }

    /// Record a message stamped with the local wall-clock time.
    pub fn record(&mut self, message: &str) {
        self.record_at(Local::now(), message);
    }

    pub fn record_at(&mut self, at: DateTime<Local>, message: &str) {
        self.entries
            .push_front(format!("[{}] {}", at.format("%H:%M:%S"), message));
        self.entries.truncate(self.capacity);
    }

    /// Entries, newest first.
    pub fn entries(&self) -> impl Iterator<Item = &String> {
        self.entries.iter()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One indicator row on the dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndicatorReading {
    pub key: String,
    pub label: String,
    pub value: f64,
    /// Above the hot-reading cutoff.
    pub hot: bool,
}

/// One category tab on the dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryPanel {
    pub category: Category,
    pub title: String,
    pub weight: f64,
    pub average: f64,
    pub indicators: Vec<IndicatorReading>,
}

/// Metadata about the dashboard snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardMetadata {
    /// When the dashboard was rendered.
    pub generated_at: DateTime<Utc>,
    /// Model used for sweeps and SITREPs.
    pub model_used: String,
    /// Escalation probability, 0-100.
    pub escalation_score: u8,
    pub threat_level: ThreatLevel,
    pub headline: String,
    /// Mutation counter of the rendered snapshot.
    pub revision: u64,
    /// Seconds until the next scheduled sweep, in watch mode.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_scan_in: Option<u64>,
}

/// The complete rendered state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dashboard {
    pub metadata: DashboardMetadata,
    pub categories: Vec<CategoryPanel>,
    /// Model-written SITREP, if one was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sitrep: Option<String>,
    /// Free-text sweep answer that did not match the matrix shape.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_report: Option<String>,
    /// Recent analysis events, newest first.
    pub analysis_log: Vec<String>,
}
