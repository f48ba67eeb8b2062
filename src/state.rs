use anyhow::Result;
use tracing::{debug, warn};

use crate::models::{LocationOption, Vacancy};

pub const DEFAULT_PAGE_SIZE: u32 = 9;

/// Major options offered by the upstream UI. The API has no endpoint for
/// these; the list is fixed.
pub const MAJOR_OPTIONS: &[&str] = &[
    "Teknik Informatika",
    "Sistem Informasi",
    "Teknik Elektro",
    "Manajemen",
    "Akuntansi",
    "Psikologi",
    "Desain Komunikasi Visual",
    "Arsitektur",
    "Ilmu Komunikasi",
    "Biologi",
    "Hukum",
    "Teknik Mesin",
    "Teknik Sipil",
    "Ilmu Pemerintahan",
    "Fisika",
    "Kimia",
    "Matematika",
    "Sastra Inggris",
    "Pendidikan Guru Sekolah Dasar",
    "Farmasi",
];

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filters {
    pub search: String,
    pub province: Option<LocationOption>,
    pub city: Option<LocationOption>,
    pub major: Option<String>,
}

impl Filters {
    /// A city is only meaningful inside its parent province's option set,
    /// so it is cleared on every province change.
    pub fn set_province(&mut self, province: Option<LocationOption>) {
        self.city = None;
        self.province = province;
    }
}

/// Narrows the fetched set by search text, city, and major, entirely in
/// memory. Pure; the caller owns page resets.
pub fn project(records: &[Vacancy], filters: &Filters) -> Vec<Vacancy> {
    records
        .iter()
        .filter(|v| matches(v, filters))
        .cloned()
        .collect()
}

fn matches(v: &Vacancy, f: &Filters) -> bool {
    let query = f.search.trim().to_lowercase();
    if !query.is_empty()
        && !v.posisi.to_lowercase().contains(&query)
        && !v.employer_name().to_lowercase().contains(&query)
    {
        return false;
    }

    if let Some(city) = &f.city {
        if v.city() != city.value {
            return false;
        }
    }

    if let Some(major) = &f.major {
        // Records with unparseable majors are excluded here by design of
        // the upstream filter: majors() is empty for them.
        let wanted = major.to_lowercase();
        if !v.majors().iter().any(|m| m.title.to_lowercase() == wanted) {
            return false;
        }
    }

    true
}

// --- Paginator ---

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageItem {
    Page(u32),
    Gap,
}

#[derive(Debug, Clone)]
pub struct Pager {
    pub current: u32,
    pub page_size: u32,
}

impl Pager {
    pub fn new(page_size: u32) -> Self {
        Self {
            current: 1,
            page_size: page_size.max(1),
        }
    }

    pub fn total_pages(&self, count: usize) -> u32 {
        ((count as u32).div_ceil(self.page_size)).max(1)
    }

    pub fn reset(&mut self) {
        self.current = 1;
    }

    /// No-op outside `[1, total]`.
    pub fn set_page(&mut self, n: u32, total: u32) {
        if (1..=total).contains(&n) {
            self.current = n;
        }
    }

    /// The current page's sub-range, clamped to the available length.
    pub fn slice<'a, T>(&self, items: &'a [T]) -> &'a [T] {
        let start = (((self.current - 1) * self.page_size) as usize).min(items.len());
        let end = ((self.current * self.page_size) as usize).min(items.len());
        &items[start..end]
    }

    /// Ellipsis-compressed page indicator: always page 1 and the last page,
    /// a three-wide run around the current page, and a gap marker per side
    /// only when more than one page is omitted (a single omitted page is
    /// shown as itself).
    pub fn window(current: u32, total: u32) -> Vec<PageItem> {
        if total <= 1 {
            return vec![PageItem::Page(1)];
        }

        let mut lo = current.saturating_sub(1).max(1);
        let mut hi = current.saturating_add(1).min(total);
        // Keep the middle run three wide at the edges.
        if current <= 1 {
            hi = lo.saturating_add(2).min(total);
        }
        if current >= total {
            lo = hi.saturating_sub(2).max(1);
        }

        let mut out = Vec::new();
        if lo > 1 {
            out.push(PageItem::Page(1));
            if lo == 3 {
                out.push(PageItem::Page(2));
            } else if lo > 3 {
                out.push(PageItem::Gap);
            }
        }
        out.extend((lo..=hi).map(PageItem::Page));
        if hi < total {
            if hi + 2 == total {
                out.push(PageItem::Page(total - 1));
            } else if hi + 2 < total {
                out.push(PageItem::Gap);
            }
            out.push(PageItem::Page(total));
        }
        out
    }
}

// --- Controller ---

/// Tokens returned by a province change; each pending fetch the caller
/// spawns must hand its token back with the result.
#[derive(Debug, Clone, Copy)]
pub struct ProvinceChange {
    /// `None` when no province is selected: there is nothing to fetch and
    /// the city options were cleared synchronously.
    pub city_token: Option<u64>,
    pub vacancy_token: u64,
}

/// Owns the filter state, pagination state, and the latest fetched result
/// set. All mutation goes through here, sequenced on one thread; stale
/// fetch results are recognized by generation token and discarded.
#[derive(Debug)]
pub struct App {
    pub filters: Filters,
    pub pager: Pager,
    pub loading: bool,
    pub provinces: Vec<LocationOption>,
    pub cities: Vec<LocationOption>,
    all: Vec<Vacancy>,
    visible: Vec<Vacancy>,
    vacancy_gen: u64,
    city_gen: u64,
}

impl App {
    pub fn new(page_size: u32) -> Self {
        Self {
            filters: Filters::default(),
            pager: Pager::new(page_size),
            loading: false,
            provinces: Vec::new(),
            cities: Vec::new(),
            all: Vec::new(),
            visible: Vec::new(),
            vacancy_gen: 0,
            city_gen: 0,
        }
    }

    /// Projection of the latest fetch under the current filters.
    pub fn visible(&self) -> &[Vacancy] {
        &self.visible
    }

    pub fn total_pages(&self) -> u32 {
        self.pager.total_pages(self.visible.len())
    }

    /// The records for the current page.
    pub fn page_items(&self) -> &[Vacancy] {
        self.pager.slice(&self.visible)
    }

    pub fn set_page(&mut self, n: u32) {
        let total = self.total_pages();
        self.pager.set_page(n, total);
    }

    pub fn next_page(&mut self) {
        self.set_page(self.pager.current + 1);
    }

    pub fn prev_page(&mut self) {
        self.set_page(self.pager.current.saturating_sub(1));
    }

    pub fn set_search(&mut self, search: String) {
        self.filters.search = search;
        self.reproject();
    }

    pub fn set_city(&mut self, city: Option<LocationOption>) {
        self.filters.city = city;
        self.reproject();
    }

    pub fn set_major(&mut self, major: Option<String>) {
        self.filters.major = major;
        self.reproject();
    }

    /// Changes the province, clearing the dependent city state and
    /// superseding any in-flight city or vacancy fetch. The caller starts
    /// the fetches named by the returned tokens.
    pub fn set_province(&mut self, province: Option<LocationOption>) -> ProvinceChange {
        self.filters.set_province(province);
        self.cities.clear();
        // Bumping unconditionally orphans a fetch still running for the
        // previous province, even when no new one is started.
        self.city_gen += 1;
        let city_token = self.filters.province.as_ref().map(|_| self.city_gen);
        let vacancy_token = self.begin_vacancy_fetch();
        self.reproject();
        ProvinceChange {
            city_token,
            vacancy_token,
        }
    }

    pub fn begin_vacancy_fetch(&mut self) -> u64 {
        self.vacancy_gen += 1;
        self.loading = true;
        self.vacancy_gen
    }

    /// Applies a vacancy fetch outcome, unless a newer fetch has started
    /// since this one was issued. Returns whether the result was applied.
    pub fn apply_vacancy_result(&mut self, token: u64, result: Result<Vec<Vacancy>>) -> bool {
        if token != self.vacancy_gen {
            debug!(token, current = self.vacancy_gen, "dropping superseded vacancy fetch");
            return false;
        }
        self.loading = false;
        self.all = match result {
            Ok(records) => records,
            Err(err) => {
                warn!(error = %err, "vacancy fetch failed");
                Vec::new()
            }
        };
        self.reproject();
        true
    }

    pub fn apply_city_result(&mut self, token: u64, result: Result<Vec<LocationOption>>) -> bool {
        if token != self.city_gen {
            debug!(token, current = self.city_gen, "dropping superseded city fetch");
            return false;
        }
        self.cities = match result {
            Ok(options) => options,
            Err(err) => {
                warn!(error = %err, "city fetch failed");
                Vec::new()
            }
        };
        true
    }

    pub fn set_provinces(&mut self, result: Result<Vec<LocationOption>>) {
        self.provinces = match result {
            Ok(options) => options,
            Err(err) => {
                warn!(error = %err, "province fetch failed");
                Vec::new()
            }
        };
    }

    fn reproject(&mut self) {
        self.visible = project(&self.all, &self.filters);
        self.pager.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use serde_json::json;

    fn vac(title: &str, employer: &str, city: &str) -> Vacancy {
        serde_json::from_value(json!({
            "id_posisi": title,
            "posisi": title,
            "perusahaan": {
                "nama_perusahaan": employer,
                "nama_provinsi": "Aceh",
                "nama_kabupaten": city,
            },
        }))
        .unwrap()
    }

    fn opt(value: &str, label: &str) -> LocationOption {
        LocationOption {
            value: value.to_string(),
            label: label.to_string(),
        }
    }

    #[test]
    fn search_matches_title_or_employer() {
        let records = vec![
            vac("Backend Intern", "PT Alpha", "Banda Aceh"),
            vac("Marketing Intern", "Beta Backend Corp", "Banda Aceh"),
            vac("Designer", "PT Gamma", "Banda Aceh"),
        ];
        let filters = Filters {
            search: "backend".to_string(),
            ..Filters::default()
        };
        let out = project(&records, &filters);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn city_filter_is_exact() {
        let records = vec![
            vac("A", "PT Alpha", "Banda Aceh"),
            vac("B", "PT Beta", "Aceh Besar"),
        ];
        let filters = Filters {
            city: Some(opt("Banda Aceh", "Banda Aceh")),
            ..Filters::default()
        };
        let out = project(&records, &filters);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].posisi, "A");
    }

    #[test]
    fn major_filter_is_case_insensitive() {
        let mut with_major = vac("A", "PT Alpha", "Banda Aceh");
        with_major.program_studi = Some(json!([{"title": "Teknik Informatika"}]));
        let without = vac("B", "PT Beta", "Banda Aceh");

        let filters = Filters {
            major: Some("teknik informatika".to_string()),
            ..Filters::default()
        };
        let out = project(&[with_major, without], &filters);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].posisi, "A");
    }

    #[test]
    fn unparseable_majors_excluded_only_under_major_filter() {
        let mut broken = vac("A", "PT Alpha", "Banda Aceh");
        broken.program_studi = Some(json!("not valid json"));
        let records = vec![broken];

        let filters = Filters {
            major: Some("Manajemen".to_string()),
            ..Filters::default()
        };
        assert!(project(&records, &filters).is_empty());
        assert_eq!(project(&records, &Filters::default()).len(), 1);
    }

    #[test]
    fn project_is_idempotent() {
        let records = vec![
            vac("Backend Intern", "PT Alpha", "Banda Aceh"),
            vac("Designer", "PT Beta", "Aceh Besar"),
        ];
        let filters = Filters {
            search: "intern".to_string(),
            city: Some(opt("Banda Aceh", "Banda Aceh")),
            ..Filters::default()
        };
        let once = project(&records, &filters);
        let twice = project(&once, &filters);
        assert_eq!(once.len(), twice.len());
        assert!(once
            .iter()
            .zip(&twice)
            .all(|(a, b)| a.id_posisi == b.id_posisi));
    }

    #[test]
    fn pager_slices_and_clamps() {
        let items: Vec<u32> = (0..25).collect();
        let mut pager = Pager::new(12);
        assert_eq!(pager.total_pages(items.len()), 3);
        assert_eq!(pager.slice(&items).len(), 12);

        pager.set_page(3, 3);
        assert_eq!(pager.slice(&items), &[24]);

        // Out-of-range requests are no-ops.
        pager.set_page(4, 3);
        assert_eq!(pager.current, 3);
        pager.set_page(0, 3);
        assert_eq!(pager.current, 3);

        assert_eq!(pager.total_pages(0), 1);
        pager.reset();
        let empty: Vec<u32> = Vec::new();
        assert!(pager.slice(&empty).is_empty());
    }

    #[test]
    fn page_window_shapes() {
        use PageItem::{Gap, Page};

        assert_eq!(Pager::window(2, 3), vec![Page(1), Page(2), Page(3)]);
        assert_eq!(
            Pager::window(1, 10),
            vec![Page(1), Page(2), Page(3), Gap, Page(10)]
        );
        assert_eq!(
            Pager::window(5, 10),
            vec![Page(1), Gap, Page(4), Page(5), Page(6), Gap, Page(10)]
        );
        // A single omitted page is shown, not collapsed.
        assert_eq!(
            Pager::window(4, 10),
            vec![Page(1), Page(2), Page(3), Page(4), Page(5), Gap, Page(10)]
        );
        assert_eq!(
            Pager::window(10, 10),
            vec![Page(1), Gap, Page(8), Page(9), Page(10)]
        );
        assert_eq!(Pager::window(1, 1), vec![Page(1)]);
    }

    #[test]
    fn province_change_clears_city_and_resets_page() {
        let mut app = App::new(2);
        let token = app.begin_vacancy_fetch();
        let records: Vec<Vacancy> = (0..5)
            .map(|i| vac(&format!("Job {i}"), "PT Alpha", "Banda Aceh"))
            .collect();
        assert!(app.apply_vacancy_result(token, Ok(records)));

        app.set_city(Some(opt("Banda Aceh", "Banda Aceh")));
        app.set_page(2);
        assert_eq!(app.pager.current, 2);

        app.set_province(Some(opt("12", "Sumatera Utara")));
        assert!(app.filters.city.is_none());
        assert_eq!(app.pager.current, 1);
        assert!(app.cities.is_empty());
    }

    #[test]
    fn superseded_vacancy_fetch_is_discarded() {
        let mut app = App::new(9);
        let stale = app.begin_vacancy_fetch();
        let fresh = app.begin_vacancy_fetch();

        let stale_records = vec![vac("Old", "PT Alpha", "Banda Aceh")];
        assert!(!app.apply_vacancy_result(stale, Ok(stale_records)));
        assert!(app.visible().is_empty());
        assert!(app.loading);

        let fresh_records = vec![vac("New", "PT Beta", "Medan")];
        assert!(app.apply_vacancy_result(fresh, Ok(fresh_records)));
        assert!(!app.loading);
        assert_eq!(app.visible().len(), 1);
        assert_eq!(app.visible()[0].posisi, "New");
    }

    #[test]
    fn failed_fetch_settles_to_empty() {
        let mut app = App::new(9);
        let token = app.begin_vacancy_fetch();
        assert!(app.apply_vacancy_result(token, Err(anyhow!("connection refused"))));
        assert!(!app.loading);
        assert!(app.visible().is_empty());
        assert_eq!(app.total_pages(), 1);
    }

    #[test]
    fn deselecting_province_orphans_inflight_city_fetch() {
        let mut app = App::new(9);

        // Selecting Aceh starts a city fetch scoped to code "11".
        let change = app.set_province(Some(opt("11", "Aceh")));
        let city_token = change.city_token.expect("city fetch expected");

        // The province is deselected before the fetch resolves.
        let change = app.set_province(None);
        assert!(change.city_token.is_none());

        // The late response must not populate the cleared option list.
        let aceh_cities = vec![opt("Banda Aceh", "Banda Aceh")];
        assert!(!app.apply_city_result(city_token, Ok(aceh_cities)));
        assert!(app.cities.is_empty());
    }

    #[test]
    fn city_results_apply_for_current_token() {
        let mut app = App::new(9);
        let change = app.set_province(Some(opt("11", "Aceh")));
        let token = change.city_token.unwrap();
        assert!(app.apply_city_result(token, Ok(vec![opt("Banda Aceh", "Banda Aceh")])));
        assert_eq!(app.cities.len(), 1);

        // A failed fetch settles to an empty option list.
        let change = app.set_province(Some(opt("12", "Sumatera Utara")));
        let token = change.city_token.unwrap();
        assert!(app.apply_city_result(token, Err(anyhow!("timeout"))));
        assert!(app.cities.is_empty());
    }

    #[test]
    fn filter_changes_reset_current_page() {
        let mut app = App::new(1);
        let token = app.begin_vacancy_fetch();
        let records: Vec<Vacancy> = (0..3)
            .map(|i| vac(&format!("Intern {i}"), "PT Alpha", "Banda Aceh"))
            .collect();
        app.apply_vacancy_result(token, Ok(records));

        app.set_page(3);
        assert_eq!(app.pager.current, 3);
        app.set_search("intern".to_string());
        assert_eq!(app.pager.current, 1);

        app.set_page(2);
        app.set_major(Some("Fisika".to_string()));
        assert_eq!(app.pager.current, 1);
        assert!(app.visible().is_empty());
    }
}
