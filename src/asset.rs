//! asset.rs
//!
//! The crypto-asset record as it arrives from and returns to callers, plus the
//! two transformations applied to it: normalization on the way in (canonical
//! storage form, validation) and display formatting on the way out.

use crate::errors::AssetError;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// `YYYY-MM-DD`, the only accepted date shape.
const ISO_DATE: &str = "%Y-%m-%d";

/// One crypto asset. Every field is optional so the same type carries full
/// registrations, sparse updates and read results.
///
/// `team` keeps three states apart: `None` leaves an existing team alone,
/// `Some(vec![])` clears it and `Some(members)` replaces it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CryptoAsset {
    pub id: Option<String>,
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub description: Option<String>,
    pub team: Option<Vec<String>>,
    pub ico_amount: Option<f64>,
    pub block_reward: Option<f64>,
    pub funding_status: Option<String>,
    pub founded_date: Option<String>,
    pub coin_type: Option<String>,
    pub website: Option<String>,
}

impl CryptoAsset {
    /// Rewrite every present field into its canonical storage form and
    /// validate it. Returns the parsed id, or 0 when none was given.
    ///
    /// Case-insensitive fields (`name`, `symbol`, `fundingStatus`, `coinType`,
    /// `website`) are trimmed and lower-cased. `description` and team members
    /// are only trimmed: their capitalization carries meaning.
    pub fn normalize(&mut self) -> Result<i64, AssetError> {
        let id = match &self.id {
            Some(raw) => raw
                .parse::<i64>()
                .map_err(|_| AssetError::InvalidIdentifier(raw.clone()))?,
            None => 0,
        };

        canonicalize_in_place(&mut self.name);
        canonicalize_in_place(&mut self.symbol);

        if let Some(description) = self.description.as_mut() {
            *description = description.trim().to_string();
        }

        if let Some(team) = self.team.as_mut() {
            for member in team.iter_mut() {
                *member = member.trim().to_string();
            }
        }

        if matches!(self.ico_amount, Some(amount) if amount < 0.0) {
            return Err(AssetError::NegativeAmount("ICO amount"));
        }
        if matches!(self.block_reward, Some(reward) if reward < 0.0) {
            return Err(AssetError::NegativeAmount("block reward"));
        }

        canonicalize_in_place(&mut self.funding_status);

        if let Some(date) = self.founded_date.as_mut() {
            let trimmed = date.trim();
            match parse_iso_date(trimmed) {
                Some(parsed) if parsed <= Utc::now().date_naive() => {}
                _ => return Err(AssetError::InvalidDate(trimmed.to_string())),
            }
            *date = trimmed.to_string();
        }

        canonicalize_in_place(&mut self.coin_type);
        canonicalize_in_place(&mut self.website);

        Ok(id)
    }

    /// Apply display casing to a record read from storage: title-case for
    /// `name` and `coinType`, upper-case for `symbol` and `fundingStatus`.
    /// Idempotent.
    pub fn format(&mut self) {
        if let Some(name) = self.name.as_mut() {
            *name = title_case(name.trim());
        }
        if let Some(symbol) = self.symbol.as_mut() {
            *symbol = symbol.trim().to_uppercase();
        }
        if let Some(status) = self.funding_status.as_mut() {
            *status = status.trim().to_uppercase();
        }
        if let Some(coin_type) = self.coin_type.as_mut() {
            *coin_type = title_case(coin_type.trim());
        }
    }
}

/// Trim and lower-case: the storage form of case-insensitive text.
pub fn canonical(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Parse a strict, zero-padded `YYYY-MM-DD` date.
///
/// Stored dates are compared as text, which only orders correctly for this
/// fixed-width form. The input must be exactly what the date formats back
/// to, so `2009-1-3` and space-padded `2009-01- 3` are both rejected.
pub fn parse_iso_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, ISO_DATE)
        .ok()
        .filter(|date| date.format(ISO_DATE).to_string() == value)
}

fn canonicalize_in_place(field: &mut Option<String>) {
    if let Some(value) = field.as_mut() {
        *value = canonical(value);
    }
}

/// Lower-case the input, then upper-case the first letter of every word.
/// Words are split on anything that is not a letter, digit or underscore, so
/// `no-ico` becomes `No-Ico`.
fn title_case(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut at_word_start = true;
    for c in value.chars().flat_map(char::to_lowercase) {
        if at_word_start {
            out.extend(c.to_uppercase());
        } else {
            out.push(c);
        }
        at_word_start = is_word_separator(c);
    }
    out
}

fn is_word_separator(c: char) -> bool {
    if c.is_ascii() {
        !(c.is_ascii_alphanumeric() || c == '_')
    } else {
        c.is_whitespace()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn raw_bitcoin() -> CryptoAsset {
        CryptoAsset {
            name: Some("   biTcoiN    ".into()),
            symbol: Some("   btc    ".into()),
            description: Some("   The original cryptocurrency   ".into()),
            team: Some(vec![
                "  Satoshi Nakomoto  ".into(),
                "  Hal Finney  ".into(),
                "  Nick Szabo  ".into(),
            ]),
            ico_amount: Some(0.0),
            block_reward: Some(12.5),
            funding_status: Some("no-ico".into()),
            founded_date: Some("   2009-01-03   ".into()),
            coin_type: Some("   cuRRency ".into()),
            website: Some("   https://Bitcoin.org/en/   ".into()),
            ..Default::default()
        }
    }

    #[test]
    fn normalize_canonicalizes_every_field() {
        let mut asset = raw_bitcoin();
        let id = asset.normalize().unwrap();

        assert_eq!(id, 0);
        assert_eq!(asset.name.as_deref(), Some("bitcoin"));
        assert_eq!(asset.symbol.as_deref(), Some("btc"));
        assert_eq!(asset.description.as_deref(), Some("The original cryptocurrency"));
        assert_eq!(
            asset.team,
            Some(vec![
                "Satoshi Nakomoto".to_string(),
                "Hal Finney".to_string(),
                "Nick Szabo".to_string()
            ])
        );
        assert_eq!(asset.funding_status.as_deref(), Some("no-ico"));
        assert_eq!(asset.founded_date.as_deref(), Some("2009-01-03"));
        assert_eq!(asset.coin_type.as_deref(), Some("currency"));
        assert_eq!(asset.website.as_deref(), Some("https://bitcoin.org/en/"));
        assert_eq!(asset.ico_amount, Some(0.0));
    }

    #[test]
    fn normalize_is_idempotent() {
        let mut once = raw_bitcoin();
        once.normalize().unwrap();
        let mut twice = once.clone();
        twice.normalize().unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn normalize_leaves_absent_fields_absent() {
        let mut asset = CryptoAsset {
            symbol: Some(" ANT ".into()),
            ..Default::default()
        };
        asset.normalize().unwrap();
        assert_eq!(
            asset,
            CryptoAsset {
                symbol: Some("ant".into()),
                ..Default::default()
            }
        );
    }

    #[test]
    fn empty_team_stays_empty_not_absent() {
        let mut asset = CryptoAsset {
            team: Some(vec![]),
            ..Default::default()
        };
        asset.normalize().unwrap();
        assert_eq!(asset.team, Some(vec![]));
    }

    #[test]
    fn parses_numeric_id() {
        let mut asset = CryptoAsset {
            id: Some("42".into()),
            ..Default::default()
        };
        assert_eq!(asset.normalize().unwrap(), 42);
    }

    #[test]
    fn rejects_non_numeric_id() {
        let mut asset = CryptoAsset {
            id: Some("a".into()),
            ..Default::default()
        };
        let err = asset.normalize().unwrap_err();
        assert!(matches!(err, AssetError::InvalidIdentifier(ref raw) if raw == "a"));
        assert_eq!(err.to_string(), "invalid id: a");
    }

    #[test]
    fn rejects_negative_amounts() {
        let mut ico = CryptoAsset {
            ico_amount: Some(-1.5),
            ..Default::default()
        };
        let err = ico.normalize().unwrap_err();
        assert_eq!(err.to_string(), "ICO amount cannot be negative");

        let mut reward = CryptoAsset {
            block_reward: Some(-1.5),
            ..Default::default()
        };
        let err = reward.normalize().unwrap_err();
        assert_eq!(err.to_string(), "block reward cannot be negative");
    }

    #[test]
    fn rejects_non_iso_date() {
        let mut asset = CryptoAsset {
            founded_date: Some("12/25/2017".into()),
            ..Default::default()
        };
        assert!(matches!(asset.normalize(), Err(AssetError::InvalidDate(_))));
    }

    #[test]
    fn rejects_unpadded_date() {
        for date in ["2009-1-3", "2009-01- 3", "2009- 1-03", "2009-01-3 "] {
            let mut asset = CryptoAsset {
                founded_date: Some(date.into()),
                ..Default::default()
            };
            assert!(
                matches!(asset.normalize(), Err(AssetError::InvalidDate(_))),
                "{date:?} should be rejected"
            );
        }
        assert_eq!(parse_iso_date("2009-01- 3"), None);
        assert!(parse_iso_date("2009-01-03").is_some());
    }

    #[test]
    fn rejects_future_date() {
        let tomorrow = (Utc::now().date_naive() + Duration::days(1))
            .format(ISO_DATE)
            .to_string();
        let mut asset = CryptoAsset {
            founded_date: Some(tomorrow),
            ..Default::default()
        };
        assert!(matches!(asset.normalize(), Err(AssetError::InvalidDate(_))));
    }

    #[test]
    fn accepts_genesis_date_unchanged() {
        let mut asset = CryptoAsset {
            founded_date: Some("2009-01-03".into()),
            ..Default::default()
        };
        asset.normalize().unwrap();
        assert_eq!(asset.founded_date.as_deref(), Some("2009-01-03"));
    }

    #[test]
    fn format_applies_display_casing() {
        let mut asset = CryptoAsset {
            name: Some("bitcoin cash".into()),
            symbol: Some("bch".into()),
            funding_status: Some("no-ico".into()),
            coin_type: Some("currency".into()),
            website: Some("https://bitcoincash.org".into()),
            ..Default::default()
        };
        asset.format();

        assert_eq!(asset.name.as_deref(), Some("Bitcoin Cash"));
        assert_eq!(asset.symbol.as_deref(), Some("BCH"));
        assert_eq!(asset.funding_status.as_deref(), Some("NO-ICO"));
        assert_eq!(asset.coin_type.as_deref(), Some("Currency"));
        assert_eq!(asset.website.as_deref(), Some("https://bitcoincash.org"));

        let formatted = asset.clone();
        asset.format();
        assert_eq!(asset, formatted);
    }

    #[test]
    fn title_case_splits_on_punctuation() {
        assert_eq!(title_case("no-ico"), "No-Ico");
        assert_eq!(title_case("proof_of_work"), "Proof_of_work");
        assert_eq!(title_case("ÉTHER classic"), "Éther Classic");
    }

    #[test]
    fn deserializes_camel_case_and_null_team() {
        let asset: CryptoAsset =
            serde_json::from_str(r#"{"icoAmount": 1.5, "coinType": "platform", "team": null}"#)
                .unwrap();
        assert_eq!(asset.ico_amount, Some(1.5));
        assert_eq!(asset.coin_type.as_deref(), Some("platform"));
        assert_eq!(asset.team, None);
    }
}
