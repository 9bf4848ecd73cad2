use strum_macros::{Display, EnumString};

/// Expiry and condition flags of `SET`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SetOptions {
    pub ex: Option<u64>,
    pub px: Option<u64>,
    pub nx: bool,
    pub xx: bool,
}

impl SetOptions {
    pub fn ex(mut self, seconds: u64) -> SetOptions {
        self.ex = Some(seconds);
        self
    }

    pub fn px(mut self, millis: u64) -> SetOptions {
        self.px = Some(millis);
        self
    }

    /// Only set the key if it does not already exist.
    pub fn nx(mut self) -> SetOptions {
        self.nx = true;
        self
    }

    /// Only set the key if it already exists.
    pub fn xx(mut self) -> SetOptions {
        self.xx = true;
        self
    }
}

/// Arguments of `SORT`.
///
/// `alpha` compares stored bytes, which is only meaningful for codecs that preserve lexical
/// order. `by` reads numeric weights, so it needs a codec that stores numbers as text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SortOptions {
    pub by: Option<String>,
    pub limit: Option<(i64, i64)>,
    pub get: Vec<String>,
    pub desc: bool,
    pub alpha: bool,
}

impl SortOptions {
    pub fn by(mut self, pattern: &str) -> SortOptions {
        self.by = Some(pattern.to_string());
        self
    }

    pub fn limit(mut self, offset: i64, count: i64) -> SortOptions {
        self.limit = Some((offset, count));
        self
    }

    pub fn get(mut self, pattern: &str) -> SortOptions {
        self.get.push(pattern.to_string());
        self
    }

    pub fn desc(mut self) -> SortOptions {
        self.desc = true;
        self
    }

    pub fn alpha(mut self) -> SortOptions {
        self.alpha = true;
        self
    }
}

/// Flags of `GEORADIUS` and `GEORADIUSBYMEMBER`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeoRadiusOptions {
    pub with_dist: bool,
    pub with_coord: bool,
    pub with_hash: bool,
    pub count: Option<u64>,
    pub order: Option<Order>,
}

impl GeoRadiusOptions {
    pub fn with_dist(mut self) -> GeoRadiusOptions {
        self.with_dist = true;
        self
    }

    pub fn with_coord(mut self) -> GeoRadiusOptions {
        self.with_coord = true;
        self
    }

    pub fn with_hash(mut self) -> GeoRadiusOptions {
        self.with_hash = true;
        self
    }

    pub fn count(mut self, count: u64) -> GeoRadiusOptions {
        self.count = Some(count);
        self
    }

    pub fn order(mut self, order: Order) -> GeoRadiusOptions {
        self.order = Some(order);
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "lowercase")]
pub enum GeoUnit {
    #[default]
    M,
    Km,
    Mi,
    Ft,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Order {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum InsertPosition {
    Before,
    After,
}

/// How `ZUNIONSTORE` and `ZINTERSTORE` combine the scores of a member.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Aggregate {
    #[default]
    Sum,
    Min,
    Max,
}
