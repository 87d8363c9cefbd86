//! Test-only builder for `BacklinkSignal`, shared across unit test modules.

#![cfg(test)]

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::model::BacklinkSignal;

pub fn backlink() -> BacklinkBuilder {
    BacklinkBuilder::default()
}

pub struct BacklinkBuilder {
    signal: BacklinkSignal,
}

impl Default for BacklinkBuilder {
    fn default() -> Self {
        Self {
            signal: BacklinkSignal {
                source_url: "https://example.test/page".to_string(),
                domain_from: None,
                anchor: None,
                link_type: None,
                domain_rank: None,
                domain_age_days: None,
                backlink_spam_score: None,
                ip: None,
                whois_registrar: None,
                first_seen: None,
                last_seen: None,
                dofollow: None,
                links_count: None,
                safe_browsing_status: None,
                safe_browsing_threats: None,
                safe_browsing_checked_at: None,
                raw: None,
            },
        }
    }
}

macro_rules! setter {
    ($name:ident, $field:ident, $ty:ty) => {
        pub fn $name(mut self, value: $ty) -> Self {
            self.signal.$field = value;
            self
        }
    };
}

impl BacklinkBuilder {
    setter!(source_url_opt, source_url, String);
    setter!(domain_from, domain_from, Option<String>);
    setter!(anchor, anchor, Option<String>);
    setter!(link_type, link_type, Option<String>);
    setter!(domain_rank, domain_rank, Option<f64>);
    setter!(domain_age_days, domain_age_days, Option<i64>);
    setter!(spam_score, backlink_spam_score, Option<i32>);
    setter!(ip, ip, Option<String>);
    setter!(registrar, whois_registrar, Option<String>);
    setter!(first_seen, first_seen, Option<DateTime<Utc>>);
    setter!(last_seen, last_seen, Option<DateTime<Utc>>);
    setter!(dofollow, dofollow, Option<bool>);
    setter!(links_count, links_count, Option<i64>);
    setter!(safe_browsing_status, safe_browsing_status, Option<String>);

    pub fn source_url(mut self, url: &str) -> Self {
        self.signal.source_url = url.to_string();
        self
    }

    pub fn anchor_str(mut self, anchor: &str) -> Self {
        self.signal.anchor = Some(anchor.to_string());
        self
    }

    pub fn ip_str(mut self, ip: &str) -> Self {
        self.signal.ip = Some(ip.to_string());
        self
    }

    pub fn registrar_str(mut self, registrar: &str) -> Self {
        self.signal.whois_registrar = Some(registrar.to_string());
        self
    }

    pub fn domain_from_str(mut self, domain: &str) -> Self {
        self.signal.domain_from = Some(domain.to_string());
        self
    }

    pub fn text(mut self, pre: &str, post: &str) -> Self {
        let mut raw = Map::new();
        raw.insert("text_pre".to_string(), Value::String(pre.to_string()));
        raw.insert("text_post".to_string(), Value::String(post.to_string()));
        self.signal.raw = Some(raw);
        self
    }

    pub fn build(self) -> BacklinkSignal {
        self.signal
    }
}
