//! Dense date × entity matrix.
//!
//! Rows follow a strictly increasing [`TradingDate`] axis, columns a sorted,
//! duplicate-free entity axis. Each cell is `Some(value)` or unfilled
//! (`None`). Cells are stored row-major.
//!
//! Frame layout: a leading `trade_date` Int32 column (`YYYYMMDD`) followed by
//! one column per entity, in axis order.

use crate::domain::{EntityId, TradingDate};
use crate::error::{RefDataError, Result};
use polars::prelude::*;
use std::fmt;
use std::io;
use std::path::Path;

/// Name of the date column in frame and CSV renderings.
pub const DATE_COLUMN: &str = "trade_date";

/// A value that can live in a panel cell and cross the DataFrame boundary.
pub trait PanelValue: Clone + PartialEq + fmt::Debug + Send + Sync {
    fn to_column(name: &str, values: Vec<Option<Self>>) -> Column;
    fn from_column(column: &Column) -> PolarsResult<Vec<Option<Self>>>;
    fn render(&self) -> String;
}

impl PanelValue for f64 {
    fn to_column(name: &str, values: Vec<Option<Self>>) -> Column {
        Column::new(name.into(), values)
    }

    fn from_column(column: &Column) -> PolarsResult<Vec<Option<Self>>> {
        let cast = column.cast(&DataType::Float64)?;
        Ok(cast.f64()?.into_iter().collect())
    }

    fn render(&self) -> String {
        self.to_string()
    }
}

/// 0/1 flags, stored as Int32 in frames.
impl PanelValue for u8 {
    fn to_column(name: &str, values: Vec<Option<Self>>) -> Column {
        let widened: Vec<Option<i32>> = values.into_iter().map(|v| v.map(i32::from)).collect();
        Column::new(name.into(), widened)
    }

    fn from_column(column: &Column) -> PolarsResult<Vec<Option<Self>>> {
        let cast = column.cast(&DataType::Int32)?;
        Ok(cast
            .i32()?
            .into_iter()
            .map(|v| v.and_then(|x| u8::try_from(x).ok()))
            .collect())
    }

    fn render(&self) -> String {
        self.to_string()
    }
}

impl PanelValue for String {
    fn to_column(name: &str, values: Vec<Option<Self>>) -> Column {
        Column::new(name.into(), values)
    }

    fn from_column(column: &Column) -> PolarsResult<Vec<Option<Self>>> {
        let cast = column.cast(&DataType::String)?;
        Ok(cast
            .str()?
            .into_iter()
            .map(|v| v.map(str::to_string))
            .collect())
    }

    fn render(&self) -> String {
        self.clone()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DensePanel<T> {
    dates: Vec<TradingDate>,
    entities: Vec<EntityId>,
    cells: Vec<Option<T>>,
}

/// Index weight panel.
pub type WeightPanel = DensePanel<f64>;
/// Index membership panel (0/1).
pub type MembershipPanel = DensePanel<u8>;
/// Industry code panel.
pub type IndustryPanel = DensePanel<String>;
/// Adjustment factor (or ratio) panel.
pub type FactorPanel = DensePanel<f64>;

fn check_axes(dates: &[TradingDate], entities: &[EntityId]) -> Result<()> {
    if let Some(w) = dates.windows(2).find(|w| w[0] >= w[1]) {
        return Err(RefDataError::InvalidArgument(format!(
            "date axis not strictly increasing at {} -> {}",
            w[0], w[1]
        )));
    }
    if let Some(w) = entities.windows(2).find(|w| w[0] >= w[1]) {
        return Err(RefDataError::InvalidArgument(format!(
            "entity axis not sorted and unique at {} -> {}",
            w[0], w[1]
        )));
    }
    Ok(())
}

fn frame_err(e: PolarsError) -> RefDataError {
    RefDataError::Frame(e.to_string())
}

impl<T: Clone> DensePanel<T> {
    /// An all-unfilled panel over the given axes.
    pub fn new_unfilled(dates: Vec<TradingDate>, entities: Vec<EntityId>) -> Result<Self> {
        check_axes(&dates, &entities)?;
        let cells = vec![None; dates.len() * entities.len()];
        Ok(Self {
            dates,
            entities,
            cells,
        })
    }

    /// Build from one vector per entity, each as long as the date axis.
    pub fn from_columns(
        dates: Vec<TradingDate>,
        entities: Vec<EntityId>,
        columns: Vec<Vec<Option<T>>>,
    ) -> Result<Self> {
        check_axes(&dates, &entities)?;
        if columns.len() != entities.len() {
            return Err(RefDataError::InvalidArgument(format!(
                "{} columns for {} entities",
                columns.len(),
                entities.len()
            )));
        }
        if let Some((j, col)) = columns
            .iter()
            .enumerate()
            .find(|(_, c)| c.len() != dates.len())
        {
            return Err(RefDataError::InvalidArgument(format!(
                "column '{}' has {} cells for {} dates",
                entities[j],
                col.len(),
                dates.len()
            )));
        }
        let mut panel = Self::new_unfilled(dates, entities)?;
        for (j, col) in columns.into_iter().enumerate() {
            for (i, cell) in col.into_iter().enumerate() {
                panel.set_at(i, j, cell);
            }
        }
        Ok(panel)
    }

    pub fn dates(&self) -> &[TradingDate] {
        &self.dates
    }

    pub fn entities(&self) -> &[EntityId] {
        &self.entities
    }

    pub fn n_dates(&self) -> usize {
        self.dates.len()
    }

    pub fn n_entities(&self) -> usize {
        self.entities.len()
    }

    pub fn date_index(&self, date: TradingDate) -> Option<usize> {
        self.dates.binary_search(&date).ok()
    }

    pub fn entity_index(&self, entity: &EntityId) -> Option<usize> {
        self.entities.binary_search(entity).ok()
    }

    pub fn get_at(&self, row: usize, col: usize) -> Option<&T> {
        self.cells
            .get(row * self.entities.len() + col)
            .and_then(Option::as_ref)
    }

    pub(crate) fn set_at(&mut self, row: usize, col: usize, value: Option<T>) {
        let width = self.entities.len();
        self.cells[row * width + col] = value;
    }

    /// Cell lookup by date and entity; `None` when unfilled or off-axis.
    pub fn get(&self, date: TradingDate, entity: &str) -> Option<&T> {
        let row = self.date_index(date)?;
        let col = self.entity_index(&EntityId::from(entity))?;
        self.get_at(row, col)
    }

    /// One entity's cells down the date axis.
    pub fn column(&self, entity: &str) -> Option<Vec<Option<T>>> {
        let col = self.entity_index(&EntityId::from(entity))?;
        Some(
            (0..self.dates.len())
                .map(|row| self.get_at(row, col).cloned())
                .collect(),
        )
    }

    /// One date's cells across the entity axis.
    pub fn row(&self, row: usize) -> &[Option<T>] {
        let width = self.entities.len();
        &self.cells[row * width..(row + 1) * width]
    }

    pub fn filled_count(&self) -> usize {
        self.cells.iter().filter(|c| c.is_some()).count()
    }

    pub fn is_fully_filled(&self) -> bool {
        self.cells.iter().all(Option::is_some)
    }

    /// Carry each filled cell down into the unfilled cells below it.
    pub fn forward_fill(&self) -> Self {
        let mut out = self.clone();
        for col in 0..out.entities.len() {
            let mut last: Option<T> = None;
            for row in 0..out.dates.len() {
                match out.get_at(row, col).cloned() {
                    Some(v) => last = Some(v),
                    None if last.is_some() => out.set_at(row, col, last.clone()),
                    None => {}
                }
            }
        }
        out
    }

    /// Fill each unfilled cell from the next filled cell below it.
    pub fn backward_fill(&self) -> Self {
        let mut out = self.clone();
        for col in 0..out.entities.len() {
            let mut next: Option<T> = None;
            for row in (0..out.dates.len()).rev() {
                match out.get_at(row, col).cloned() {
                    Some(v) => next = Some(v),
                    None if next.is_some() => out.set_at(row, col, next.clone()),
                    None => {}
                }
            }
        }
        out
    }

    /// Move onto a new date axis. Dates present in both keep their cells,
    /// new dates are unfilled, dropped dates disappear.
    pub fn reindex(&self, dates: Vec<TradingDate>) -> Result<Self> {
        let mut out = Self::new_unfilled(dates, self.entities.clone())?;
        for row in 0..out.dates.len() {
            if let Some(src) = self.date_index(out.dates[row]) {
                for col in 0..out.entities.len() {
                    out.set_at(row, col, self.get_at(src, col).cloned());
                }
            }
        }
        Ok(out)
    }

    /// Rows with `start <= date <= end`.
    pub fn slice_dates(&self, start: TradingDate, end: TradingDate) -> Self {
        let lo = self.dates.partition_point(|d| *d < start);
        let hi = self.dates.partition_point(|d| *d <= end).max(lo);
        let width = self.entities.len();
        Self {
            dates: self.dates[lo..hi].to_vec(),
            entities: self.entities.clone(),
            cells: self.cells[lo * width..hi * width].to_vec(),
        }
    }

    /// Apply `f` to every filled cell.
    pub fn map<U, F: Fn(&T) -> U>(&self, f: F) -> DensePanel<U> {
        DensePanel {
            dates: self.dates.clone(),
            entities: self.entities.clone(),
            cells: self.cells.iter().map(|c| c.as_ref().map(&f)).collect(),
        }
    }
}

impl<T: PanelValue> DensePanel<T> {
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let mut columns = Vec::with_capacity(self.entities.len() + 1);
        columns.push(Column::new(
            DATE_COLUMN.into(),
            self.dates.iter().map(|d| d.as_i32()).collect::<Vec<i32>>(),
        ));
        for (col, entity) in self.entities.iter().enumerate() {
            let values = (0..self.dates.len())
                .map(|row| self.get_at(row, col).cloned())
                .collect();
            columns.push(T::to_column(entity.as_str(), values));
        }
        DataFrame::new(columns).map_err(frame_err)
    }

    /// Inverse of [`to_dataframe`](Self::to_dataframe).
    pub fn from_dataframe(df: &DataFrame) -> Result<Self> {
        let date_col = df
            .column(DATE_COLUMN)
            .map_err(frame_err)?
            .cast(&DataType::Int32)
            .map_err(frame_err)?;
        let dates = date_col
            .i32()
            .map_err(frame_err)?
            .into_iter()
            .enumerate()
            .map(|(i, v)| {
                let v = v.ok_or_else(|| RefDataError::Frame(format!("null trade_date at row {i}")))?;
                TradingDate::from_int(i64::from(v))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut entities = Vec::new();
        let mut columns = Vec::new();
        for column in df.get_columns() {
            if column.name().as_str() == DATE_COLUMN {
                continue;
            }
            entities.push(EntityId::new(column.name().as_str()));
            columns.push(T::from_column(column).map_err(frame_err)?);
        }
        Self::from_columns(dates, entities, columns)
    }

    /// Write as CSV: a `trade_date` column then one column per entity;
    /// unfilled cells are empty.
    pub fn write_csv<W: io::Write>(&self, writer: W) -> Result<()> {
        let csv_err = |e: ::csv::Error| RefDataError::Io(format!("csv write: {e}"));
        let mut out = ::csv::Writer::from_writer(writer);
        let mut header = vec![DATE_COLUMN.to_string()];
        header.extend(self.entities.iter().map(|e| e.to_string()));
        out.write_record(&header).map_err(csv_err)?;
        for (row, date) in self.dates.iter().enumerate() {
            let mut record = vec![date.to_string()];
            record.extend(
                self.row(row)
                    .iter()
                    .map(|c| c.as_ref().map(T::render).unwrap_or_default()),
            );
            out.write_record(&record).map_err(csv_err)?;
        }
        out.flush()
            .map_err(|e| RefDataError::Io(format!("csv flush: {e}")))
    }

    pub fn to_csv(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path)
            .map_err(|e| RefDataError::Io(format!("create {}: {e}", path.display())))?;
        self.write_csv(file)
    }
}
