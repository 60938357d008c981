use geo::Point;
use polars::prelude::*;

use crate::{
    error::{Result, SitingError},
    geom::{Crs, Transformer},
    layer::data::{float_values, require_column, string_values, take_rows},
};

/// An ordered set of point records (points of interest) in one CRS, each with a row of attributes.
#[derive(Debug, Clone)]
pub struct PointLayer {
    name: String,
    points: Vec<Point<f64>>,
    crs: Crs,
    data: DataFrame,
}

impl PointLayer {
    pub fn new(name: impl Into<String>, points: Vec<Point<f64>>, crs: Crs, data: DataFrame) -> Result<Self> {
        if data.width() > 0 && data.height() != points.len() {
            return Err(SitingError::LayerShape { shapes: points.len(), rows: data.height() });
        }
        Ok(Self { name: name.into(), points, crs, data })
    }

    #[inline] pub fn name(&self) -> &str { &self.name }

    #[inline] pub fn len(&self) -> usize { self.points.len() }

    #[inline] pub fn is_empty(&self) -> bool { self.points.is_empty() }

    #[inline] pub fn points(&self) -> &[Point<f64>] { &self.points }

    #[inline] pub fn crs(&self) -> &Crs { &self.crs }

    #[inline] pub fn data(&self) -> &DataFrame { &self.data }

    pub fn has_column(&self, column: &str) -> bool {
        self.data.get_column_index(column).is_some()
    }

    pub fn require_column(&self, column: &str) -> Result<()> {
        require_column(&self.data, column, &self.name)
    }

    pub fn float_column(&self, column: &str) -> Result<Vec<Option<f64>>> {
        float_values(&self.data, column, &self.name)
    }

    pub fn string_column(&self, column: &str) -> Result<Vec<Option<String>>> {
        string_values(&self.data, column, &self.name)
    }

    /// Select records by position, in the given order.
    pub fn take(&self, rows: &[usize]) -> Result<Self> {
        Ok(Self {
            name: self.name.clone(),
            points: rows.iter().map(|&i| self.points[i]).collect(),
            crs: self.crs.clone(),
            data: take_rows(&self.data, rows)?,
        })
    }

    /// Keep only records whose `column` value is one of `allowed`. Null values never match.
    pub fn filter_values(&self, column: &str, allowed: &[String]) -> Result<Self> {
        let rows = self.string_column(column)?.iter().enumerate()
            .filter(|(_, value)| value.as_ref().is_some_and(|v| allowed.contains(v)))
            .map(|(i, _)| i)
            .collect::<Vec<_>>();
        self.take(&rows)
    }

    /// Add or replace an attribute column.
    pub fn with_column(mut self, column: Column) -> Result<Self> {
        if column.len() != self.len() {
            return Err(SitingError::LayerShape { shapes: self.len(), rows: column.len() });
        }
        self.data.with_column(column)?;
        Ok(self)
    }

    /// Reproject every point into `crs`. Reprojecting into the current CRS is a plain clone.
    pub fn reproject(&self, crs: &Crs) -> Result<Self> {
        if &self.crs == crs { return Ok(self.clone()) }

        let transformer = Transformer::new(&self.crs, crs)?;
        let points = self.points.iter()
            .map(|&point| transformer.apply_point(point))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { name: self.name.clone(), points, crs: crs.clone(), data: self.data.clone() })
    }
}
