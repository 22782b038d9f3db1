// SPDX-License-Identifier: MIT

//! Typed step payloads
//!
//! `StepRecord.data` is stored as raw JSON; these enums give each workflow a
//! statically known payload per step number.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::steps::error::{Result, StoreError};
use crate::steps::state::WorkflowState;

/// Payload of one step of a workflow, tagged by step number
pub trait StepPayload: Sized {
    /// Step number the payload belongs to
    fn step(&self) -> u32;

    /// JSON stored in `StepRecord.data`
    fn to_value(&self) -> Result<Value>;

    /// Decode the data recorded at `step`
    fn from_record(step: u32, data: &Value) -> Result<Self>;

    /// Decode the payload of `step` from a state, if that step completed
    fn from_state(state: &WorkflowState, step: u32) -> Result<Option<Self>> {
        state
            .data(step)
            .map(|data| Self::from_record(step, data))
            .transpose()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GoodsInScan {
    pub goods_in_id: String,
    pub barcode: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleScan {
    pub article_id: String,
    pub barcode: String,
    /// Set when the barcode identified a specific logistic unit
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub article_lu_barcode_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuantityInput {
    pub moving_quantity: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationScan {
    pub location_id: String,
    pub barcode: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HandlingUnitScan {
    pub handling_unit_id: String,
    pub barcode: String,
}

/// Reception: 10 goods-in, 20 article, 30 quantity, 40 location
#[derive(Debug, Clone, PartialEq)]
pub enum ReceptionPayload {
    GoodsIn(GoodsInScan),
    Article(ArticleScan),
    Quantity(QuantityInput),
    Location(LocationScan),
}

/// Pick and pack: 10 location, 20 handling unit, 30 article, 40 quantity,
/// 50 final handling unit
#[derive(Debug, Clone, PartialEq)]
pub enum PickAndPackPayload {
    Location(LocationScan),
    HandlingUnit(HandlingUnitScan),
    Article(ArticleScan),
    Quantity(QuantityInput),
    FinalHandlingUnit(HandlingUnitScan),
}

fn decode<T: DeserializeOwned>(step: u32, data: &Value) -> Result<T> {
    T::deserialize(data).map_err(|e| {
        StoreError::Payload {
            step,
            reason: e.to_string(),
        }
        .into()
    })
}

fn unknown_step(step: u32) -> crate::WmsError {
    StoreError::Payload {
        step,
        reason: "no payload is defined for this step".to_string(),
    }
    .into()
}

impl StepPayload for ReceptionPayload {
    fn step(&self) -> u32 {
        match self {
            Self::GoodsIn(_) => 10,
            Self::Article(_) => 20,
            Self::Quantity(_) => 30,
            Self::Location(_) => 40,
        }
    }

    fn to_value(&self) -> Result<Value> {
        Ok(match self {
            Self::GoodsIn(p) => serde_json::to_value(p)?,
            Self::Article(p) => serde_json::to_value(p)?,
            Self::Quantity(p) => serde_json::to_value(p)?,
            Self::Location(p) => serde_json::to_value(p)?,
        })
    }

    fn from_record(step: u32, data: &Value) -> Result<Self> {
        match step {
            10 => decode(step, data).map(Self::GoodsIn),
            20 => decode(step, data).map(Self::Article),
            30 => decode(step, data).map(Self::Quantity),
            40 => decode(step, data).map(Self::Location),
            other => Err(unknown_step(other)),
        }
    }
}

impl StepPayload for PickAndPackPayload {
    fn step(&self) -> u32 {
        match self {
            Self::Location(_) => 10,
            Self::HandlingUnit(_) => 20,
            Self::Article(_) => 30,
            Self::Quantity(_) => 40,
            Self::FinalHandlingUnit(_) => 50,
        }
    }

    fn to_value(&self) -> Result<Value> {
        Ok(match self {
            Self::Location(p) => serde_json::to_value(p)?,
            Self::HandlingUnit(p) | Self::FinalHandlingUnit(p) => serde_json::to_value(p)?,
            Self::Article(p) => serde_json::to_value(p)?,
            Self::Quantity(p) => serde_json::to_value(p)?,
        })
    }

    fn from_record(step: u32, data: &Value) -> Result<Self> {
        match step {
            10 => decode(step, data).map(Self::Location),
            20 => decode(step, data).map(Self::HandlingUnit),
            30 => decode(step, data).map(Self::Article),
            40 => decode(step, data).map(Self::Quantity),
            50 => decode(step, data).map(Self::FinalHandlingUnit),
            other => Err(unknown_step(other)),
        }
    }
}
