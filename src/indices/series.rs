//! Monthly index points and ordered series

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::dates::{br_date, YearMonth};

/// One published value of an index: a percentage for the period starting at `date`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndexPoint {
    #[serde(rename = "data", with = "br_date")]
    pub date: NaiveDate,

    /// Percentage for the period (0.5 means 0.5%)
    #[serde(rename = "valor")]
    pub value: f64,
}

impl IndexPoint {
    pub fn new(date: NaiveDate, value: f64) -> Self {
        Self { date, value }
    }

    /// Monthly growth factor `1 + value/100`
    pub fn factor(&self) -> f64 {
        1.0 + self.value / 100.0
    }

    pub fn year_month(&self) -> YearMonth {
        YearMonth::from(self.date)
    }
}

/// Index points ordered by date, unique by date
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<IndexPoint>", into = "Vec<IndexPoint>")]
pub struct IndexSeries {
    points: Vec<IndexPoint>,
}

impl IndexSeries {
    /// Build a series, sorting by date. On duplicate dates the first point wins.
    pub fn new(mut points: Vec<IndexPoint>) -> Self {
        points.sort_by_key(|p| p.date);
        points.dedup_by_key(|p| p.date);
        Self { points }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn points(&self) -> &[IndexPoint] {
        &self.points
    }

    pub fn iter(&self) -> std::slice::Iter<'_, IndexPoint> {
        self.points.iter()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.points.first().map(|p| p.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.points.last().map(|p| p.date)
    }

    /// Product of `1 + value/100` over all points. Exactly 1.0 for an empty series.
    pub fn accumulation_factor(&self) -> f64 {
        self.points.iter().fold(1.0, |acc, p| acc * p.factor())
    }

    /// Compounded rate over the series (`factor - 1`)
    pub fn compounded_rate(&self) -> f64 {
        self.accumulation_factor() - 1.0
    }

    /// Points with `start <= date <= end`
    pub fn window(&self, start: NaiveDate, end: NaiveDate) -> IndexSeries {
        Self {
            points: self
                .points
                .iter()
                .filter(|p| p.date >= start && p.date <= end)
                .copied()
                .collect(),
        }
    }

    /// Union with another series. Points already present (same date) are kept
    /// as they are; only new dates are taken from `other`.
    pub fn merge(&self, other: &IndexSeries) -> IndexSeries {
        let mut points = self.points.clone();
        points.extend(other.points.iter().copied());
        Self::new(points)
    }

    /// Values keyed by calendar month. If a month has more than one point,
    /// the earliest one is used.
    pub fn by_month(&self) -> BTreeMap<YearMonth, f64> {
        let mut map = BTreeMap::new();
        for p in &self.points {
            map.entry(p.year_month()).or_insert(p.value);
        }
        map
    }
}

impl From<Vec<IndexPoint>> for IndexSeries {
    fn from(points: Vec<IndexPoint>) -> Self {
        Self::new(points)
    }
}

impl From<IndexSeries> for Vec<IndexPoint> {
    fn from(series: IndexSeries) -> Self {
        series.points
    }
}

impl<'a> IntoIterator for &'a IndexSeries {
    type Item = &'a IndexPoint;
    type IntoIter = std::slice::Iter<'a, IndexPoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}
