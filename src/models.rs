use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::debug;

pub const NO_DESCRIPTION: &str = "No description provided.";
const DESCRIPTION_LIMIT: usize = 120;

/// Accepts a string, number, or null where the API is inconsistent about
/// the JSON type of an identifier.
fn loose_string<'de, D>(de: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(de)?;
    Ok(match value {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}

/// Accepts a count as a number, numeric string, or null.
fn loose_count<'de, D>(de: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(de)?;
    Ok(match value {
        Value::Number(n) => n.as_u64().unwrap_or(0) as u32,
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Company {
    #[serde(default)]
    pub nama_perusahaan: String,
    #[serde(default)]
    pub logo: Option<String>,
    #[serde(default)]
    pub nama_provinsi: String,
    #[serde(default)]
    pub nama_kabupaten: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusRef {
    #[serde(default)]
    pub nama_status_posisi: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Major {
    #[serde(default)]
    pub title: String,
}

/// One internship posting as served by the vacancy endpoint. Every field
/// is optional or defaulted; the upstream schema drifts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vacancy {
    #[serde(default, deserialize_with = "loose_string")]
    pub id_posisi: String,
    #[serde(default)]
    pub posisi: String,
    #[serde(default)]
    pub deskripsi: Option<String>,
    #[serde(default, deserialize_with = "loose_count")]
    pub jumlah_kuota: u32,
    #[serde(default, deserialize_with = "loose_count")]
    pub jumlah_terdaftar: u32,
    #[serde(default)]
    pub perusahaan: Option<Company>,
    #[serde(default)]
    pub ref_status_posisi: Option<StatusRef>,
    /// Either a JSON array of majors or a JSON-encoded string of one.
    #[serde(default)]
    pub program_studi: Option<Value>,
}

impl Vacancy {
    pub fn employer_name(&self) -> &str {
        self.perusahaan
            .as_ref()
            .map(|c| c.nama_perusahaan.as_str())
            .unwrap_or("")
    }

    pub fn city(&self) -> &str {
        self.perusahaan
            .as_ref()
            .map(|c| c.nama_kabupaten.as_str())
            .unwrap_or("")
    }

    pub fn province(&self) -> &str {
        self.perusahaan
            .as_ref()
            .map(|c| c.nama_provinsi.as_str())
            .unwrap_or("")
    }

    pub fn status(&self) -> &str {
        self.ref_status_posisi
            .as_ref()
            .map(|s| s.nama_status_posisi.as_str())
            .unwrap_or("")
    }

    /// Eligible fields of study. The API sends this either structured or as
    /// a JSON-encoded string; anything malformed parses to an empty list.
    pub fn majors(&self) -> Vec<Major> {
        let Some(raw) = &self.program_studi else {
            return Vec::new();
        };
        let parsed = match raw {
            Value::String(s) => match serde_json::from_str::<Value>(s) {
                Ok(v) => v,
                Err(err) => {
                    debug!(id = %self.id_posisi, %err, "unparseable program_studi");
                    return Vec::new();
                }
            },
            other => other.clone(),
        };
        serde_json::from_value(parsed).unwrap_or_default()
    }

    /// Registrants as a percentage of quota; 0 when no quota is declared.
    pub fn fill_percent(&self) -> f64 {
        if self.jumlah_kuota == 0 {
            0.0
        } else {
            self.jumlah_terdaftar as f64 / self.jumlah_kuota as f64 * 100.0
        }
    }

    pub fn chance(&self) -> Chance {
        Chance::from_fill_percent(self.fill_percent())
    }

    pub fn short_description(&self) -> String {
        match self.deskripsi.as_deref().map(str::trim) {
            Some(d) if !d.is_empty() => {
                if d.chars().count() > DESCRIPTION_LIMIT {
                    let cut: String = d.chars().take(DESCRIPTION_LIMIT).collect();
                    format!("{cut}...")
                } else {
                    d.to_string()
                }
            }
            _ => NO_DESCRIPTION.to_string(),
        }
    }

    pub fn detail_url(&self) -> String {
        format!(
            "https://maganghub.kemnaker.go.id/lowongan/view/{}",
            self.id_posisi
        )
    }
}

/// Opportunity label shown on a vacancy card. Note the upstream UI labels
/// a fuller vacancy (more registrants per seat) as a *lower* chance, so a
/// fill ratio under 30% reads "High".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chance {
    High,
    Medium,
    Low,
}

impl Chance {
    pub fn from_fill_percent(percent: f64) -> Self {
        if percent < 30.0 {
            Chance::High
        } else if percent < 70.0 {
            Chance::Medium
        } else {
            Chance::Low
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Chance::High => "High",
            Chance::Medium => "Medium",
            Chance::Low => "Low",
        }
    }
}

/// A selectable filter value: (code, name) for provinces, (name, name)
/// for cities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationOption {
    pub value: String,
    pub label: String,
}

// --- Wire envelopes ---

#[derive(Debug, Clone, Deserialize)]
pub struct ListResponse<T> {
    // An explicit default path keeps the derive from requiring T: Default.
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
    #[serde(default)]
    pub meta: Option<Meta>,
}

impl<T> ListResponse<T> {
    /// Missing pagination metadata means "no more pages".
    pub fn last_page(&self) -> Option<u32> {
        self.meta.as_ref()?.pagination.as_ref()?.last_page
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Meta {
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub last_page: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProvinceRow {
    #[serde(default, deserialize_with = "loose_string")]
    pub kode_propinsi: String,
    #[serde(default)]
    pub nama_propinsi: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CityRow {
    #[serde(default)]
    pub nama_kabupaten: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vacancy_with(quota: u32, registered: u32) -> Vacancy {
        Vacancy {
            id_posisi: "1".to_string(),
            posisi: "Intern".to_string(),
            deskripsi: None,
            jumlah_kuota: quota,
            jumlah_terdaftar: registered,
            perusahaan: None,
            ref_status_posisi: None,
            program_studi: None,
        }
    }

    #[test]
    fn chance_bands() {
        assert_eq!(vacancy_with(10, 0).chance(), Chance::High);
        assert_eq!(vacancy_with(10, 2).chance(), Chance::High); // 20%
        assert_eq!(vacancy_with(10, 3).chance(), Chance::Medium); // exactly 30%
        assert_eq!(vacancy_with(10, 6).chance(), Chance::Medium); // 60%
        assert_eq!(vacancy_with(10, 7).chance(), Chance::Low); // exactly 70%
        assert_eq!(vacancy_with(10, 20).chance(), Chance::Low); // over quota
    }

    #[test]
    fn zero_quota_defaults_high() {
        assert_eq!(vacancy_with(0, 99).chance(), Chance::High);
        assert_eq!(vacancy_with(0, 99).fill_percent(), 0.0);
    }

    #[test]
    fn majors_from_structured_array() {
        let mut v = vacancy_with(1, 0);
        v.program_studi = Some(json!([{"title": "Teknik Informatika"}]));
        let majors = v.majors();
        assert_eq!(majors.len(), 1);
        assert_eq!(majors[0].title, "Teknik Informatika");
    }

    #[test]
    fn majors_from_encoded_string() {
        let mut v = vacancy_with(1, 0);
        v.program_studi = Some(json!(r#"[{"title":"Manajemen"},{"title":"Akuntansi"}]"#));
        let majors = v.majors();
        assert_eq!(majors.len(), 2);
        assert_eq!(majors[1].title, "Akuntansi");
    }

    #[test]
    fn malformed_majors_parse_to_empty() {
        let mut v = vacancy_with(1, 0);
        v.program_studi = Some(json!("not valid json"));
        assert!(v.majors().is_empty());

        v.program_studi = Some(json!({"title": "not an array"}));
        assert!(v.majors().is_empty());

        v.program_studi = None;
        assert!(v.majors().is_empty());
    }

    #[test]
    fn description_truncates_at_120() {
        let mut v = vacancy_with(1, 0);
        v.deskripsi = Some("x".repeat(121));
        let short = v.short_description();
        assert_eq!(short.chars().count(), 123);
        assert!(short.ends_with("..."));

        v.deskripsi = Some("x".repeat(120));
        assert_eq!(v.short_description().chars().count(), 120);

        v.deskripsi = None;
        assert_eq!(v.short_description(), NO_DESCRIPTION);
        v.deskripsi = Some("   ".to_string());
        assert_eq!(v.short_description(), NO_DESCRIPTION);
    }

    #[test]
    fn vacancy_tolerates_sparse_records() {
        let v: Vacancy = serde_json::from_value(json!({})).unwrap();
        assert_eq!(v.posisi, "");
        assert_eq!(v.jumlah_kuota, 0);
        assert_eq!(v.employer_name(), "");
        assert_eq!(v.city(), "");
        assert_eq!(v.status(), "");
    }

    #[test]
    fn vacancy_accepts_mixed_id_types() {
        let v: Vacancy = serde_json::from_value(json!({"id_posisi": 42})).unwrap();
        assert_eq!(v.id_posisi, "42");
        let v: Vacancy = serde_json::from_value(json!({"id_posisi": "abc"})).unwrap();
        assert_eq!(v.id_posisi, "abc");
        let v: Vacancy =
            serde_json::from_value(json!({"jumlah_kuota": "15", "jumlah_terdaftar": null}))
                .unwrap();
        assert_eq!(v.jumlah_kuota, 15);
        assert_eq!(v.jumlah_terdaftar, 0);
    }

    #[test]
    fn envelope_tolerates_missing_meta() {
        let resp: ListResponse<Vacancy> = serde_json::from_value(json!({"data": []})).unwrap();
        assert!(resp.last_page().is_none());

        let resp: ListResponse<Vacancy> = serde_json::from_value(json!({})).unwrap();
        assert!(resp.data.is_empty());
        assert!(resp.last_page().is_none());

        let resp: ListResponse<Vacancy> = serde_json::from_value(
            json!({"data": [{"posisi": "QA Intern"}], "meta": {"pagination": {"last_page": 7}}}),
        )
        .unwrap();
        assert_eq!(resp.data.len(), 1);
        assert_eq!(resp.last_page(), Some(7));
    }
}
