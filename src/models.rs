use serde::{Deserialize, Serialize};

/* -------------------------
   Response envelope
--------------------------*/

/// Every API response is wrapped as `{ "data": ..., "meta": ... }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
    #[serde(default)]
    pub meta: Option<PageMeta>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct PageMeta {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub per_page: u32,
    #[serde(default)]
    pub total_pages: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OkData {
    pub ok: bool,
}

/// A page of view models together with the pagination metadata.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub meta: PageMeta,
}

impl<T> Page<T> {
    pub fn from_response<A>(resp: ApiResponse<Vec<A>>) -> Self
    where
        A: Into<T>,
    {
        let items: Vec<T> = resp.data.into_iter().map(Into::into).collect();
        let meta = resp.meta.unwrap_or_else(|| PageMeta {
            total: items.len() as u64,
            page: 1,
            per_page: items.len() as u32,
            total_pages: 1,
        });
        Page { items, meta }
    }
}

/* -------------------------
   Query params
--------------------------*/

#[derive(Debug, Clone, Default, Serialize)]
pub struct ListParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_page: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
}

/* -------------------------
   Bilingual helpers
--------------------------*/

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    Vi,
    En,
}

impl Locale {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "vi" | "vi-vn" => Some(Locale::Vi),
            "en" | "en-us" | "en-gb" => Some(Locale::En),
            _ => None,
        }
    }
}

/// A label carried in both clinic languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Localized {
    pub vi: &'static str,
    pub en: &'static str,
}

impl Localized {
    pub const fn new(vi: &'static str, en: &'static str) -> Self {
        Localized { vi, en }
    }

    pub fn get(&self, locale: Locale) -> &'static str {
        match locale {
            Locale::Vi => self.vi,
            Locale::En => self.en,
        }
    }
}
