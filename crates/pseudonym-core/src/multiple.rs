//! Bounded collections of points with per-slot success/failure.
//!
//! The service accepts at most 10 items per batch call. Each slot holds
//! either a point or the structured problem the service reported for that
//! item, so partial success stays representable; reading a problem slot
//! surfaces it as an error ("lazy fault materialization").
//!
//! Order is load-bearing: `inputs[i]` corresponds to `outputs[i]`, and the
//! blinding scalar drawn for slot `i` must unblind exactly `outputs[i]`.


use p521::Scalar;
use serde_json::{json, Value as Json};
use tracing::debug;

use crate::domain::Domain;
use crate::error::{CoreError, CoreResult};
use crate::factory::{PseudonymFactory, PseudonymInTransitFactory};
use crate::in_transit::PseudonymInTransit;
use crate::problem::EHealthProblem;
use crate::pseudonym::Pseudonym;
use crate::value::Value;

/// Hard cap of the batch endpoints.
pub const MAX_BATCH_SIZE: usize = 10;

/// Anything that belongs to a domain and can live in a batch slot.
pub trait DomainScoped {
    fn scoped_domain(&self) -> &Domain;
}

impl DomainScoped for Value {
    fn scoped_domain(&self) -> &Domain {
        self.point().domain()
    }
}

impl DomainScoped for Pseudonym {
    fn scoped_domain(&self) -> &Domain {
        self.domain()
    }
}

impl DomainScoped for PseudonymInTransit {
    fn scoped_domain(&self) -> &Domain {
        self.domain()
    }
}

/// An ordered collection of at most [`MAX_BATCH_SIZE`] points, each slot a
/// point or a service-reported problem.
pub struct MultiplePoint<T> {
    domain: Domain,
    slots: Vec<Result<T, EHealthProblem>>,
}

pub type MultipleValue = MultiplePoint<Value>;
pub type MultiplePseudonym = MultiplePoint<Pseudonym>;
pub type MultiplePseudonymInTransit = MultiplePoint<PseudonymInTransit>;

impl<T: DomainScoped> MultiplePoint<T> {
    pub(crate) fn new(domain: Domain) -> Self {
        Self {
            domain,
            slots: Vec::with_capacity(MAX_BATCH_SIZE),
        }
    }

    pub fn domain(&self) -> &Domain {
        &self.domain
    }

    /// Append a point. Fails when the cap is reached or the point belongs
    /// to another domain.
    pub fn add(&mut self, point: T) -> CoreResult<()> {
        self.check_capacity()?;
        if point.scoped_domain().key() != self.domain.key() {
            return Err(CoreError::DomainMismatch {
                expected: self.domain.key().to_string(),
                actual: point.scoped_domain().key().to_string(),
            });
        }
        self.slots.push(Ok(point));
        Ok(())
    }

    /// Append a per-item problem reported by the service.
    pub fn add_problem(&mut self, problem: EHealthProblem) -> CoreResult<()> {
        self.check_capacity()?;
        self.slots.push(Err(problem));
        Ok(())
    }

    /// Access slot `index`; a problem slot is raised as
    /// [`CoreError::Problem`] at read time.
    pub fn get(&self, index: usize) -> CoreResult<&T> {
        match self.slots.get(index) {
            None => Err(CoreError::IndexOutOfBounds {
                index,
                len: self.slots.len(),
            }),
            Some(Ok(point)) => Ok(point),
            Some(Err(problem)) => Err(CoreError::Problem(problem.clone())),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Result<T, EHealthProblem>> {
        self.slots.iter()
    }

    fn check_capacity(&self) -> CoreResult<()> {
        if self.slots.len() >= MAX_BATCH_SIZE {
            return Err(CoreError::CapacityExceeded(MAX_BATCH_SIZE));
        }
        Ok(())
    }

    /// Collect the collection's points, failing on the first problem slot.
    fn points(&self) -> CoreResult<Vec<&T>> {
        (0..self.slots.len()).map(|i| self.get(i)).collect()
    }

    fn push_outcome(&mut self, outcome: CoreResult<T>) -> CoreResult<()> {
        match outcome {
            Ok(point) => self.add(point),
            Err(CoreError::Problem(problem)) => self.add_problem(problem),
            Err(other) => Err(other),
        }
    }
}

impl MultipleValue {
    /// Pseudonymize all values in one round trip.
    ///
    /// Sizes 0 and 1 skip the batch endpoint; per-item failures land in the
    /// corresponding output slot, whole-call failures propagate.
    pub async fn pseudonymize(&self) -> CoreResult<MultiplePseudonymInTransit> {
        let mut result = MultiplePseudonymInTransit::new(self.domain.clone());
        if self.is_empty() {
            return Ok(result);
        }
        if self.len() == 1 {
            result.push_outcome(self.get(0)?.pseudonymize().await)?;
            return Ok(result);
        }

        let client = self.domain.require_client()?;
        let mut randoms: Vec<Scalar> = Vec::with_capacity(self.len());
        let mut inputs: Vec<Json> = Vec::with_capacity(self.len());
        for value in self.points()? {
            let random = self.domain.create_random();
            let blinded = value.point().multiply(&random)?;
            inputs.push(self.domain.request_payload_value(&blinded, None));
            randoms.push(random);
        }

        debug!(count = self.len(), domain = self.domain.key(), "pseudonymize batch");
        let body = json!({ "inputs": inputs }).to_string();
        let raw = client
            .pseudonymize_multiple(self.domain.key(), &body)
            .await?;
        let outputs = parse_outputs(&raw, randoms.len())?;

        let factory = PseudonymInTransitFactory::new(self.domain.clone());
        for (output, random) in outputs.iter().zip(&randoms) {
            result.push_outcome(factory.from_response(output, random))?;
        }
        Ok(result)
    }
}

impl MultiplePseudonym {
    /// Convert all pseudonyms to in-transit pseudonyms of another domain.
    pub async fn convert_to(
        &self,
        to_domain: &Domain,
    ) -> CoreResult<MultiplePseudonymInTransit> {
        let mut result = MultiplePseudonymInTransit::new(to_domain.clone());
        if self.is_empty() {
            return Ok(result);
        }
        if self.len() == 1 {
            result.push_outcome(self.get(0)?.convert_to(to_domain).await)?;
            return Ok(result);
        }

        let client = self.domain.require_client()?;
        let mut randoms: Vec<Scalar> = Vec::with_capacity(self.len());
        let mut inputs: Vec<Json> = Vec::with_capacity(self.len());
        for pseudonym in self.points()? {
            let random = self.domain.create_random();
            let blinded = pseudonym.point().multiply(&random)?;
            inputs.push(self.domain.request_payload_value(&blinded, None));
            randoms.push(random);
        }

        debug!(
            count = self.len(),
            from = self.domain.key(),
            to = to_domain.key(),
            "convert batch"
        );
        let body = json!({ "inputs": inputs }).to_string();
        let raw = client
            .convert_multiple_to(self.domain.key(), to_domain.key(), &body)
            .await?;
        let outputs = parse_outputs(&raw, randoms.len())?;

        let factory = PseudonymInTransitFactory::new(to_domain.clone());
        for (output, random) in outputs.iter().zip(&randoms) {
            result.push_outcome(factory.from_response(output, random))?;
        }
        Ok(result)
    }
}

impl MultiplePseudonymInTransit {
    /// Identify (de-pseudonymise) all pseudonyms in transit.
    pub async fn identify(&self) -> CoreResult<MultipleValue> {
        let mut result = MultipleValue::new(self.domain.clone());
        if self.is_empty() {
            return Ok(result);
        }
        if self.len() == 1 {
            result.push_outcome(self.get(0)?.identify().await)?;
            return Ok(result);
        }

        let client = self.domain.require_client()?;
        let mut randoms: Vec<Scalar> = Vec::with_capacity(self.len());
        let mut inputs: Vec<Json> = Vec::with_capacity(self.len());
        for pseudonym_in_transit in self.points()? {
            let random = self.domain.create_random();
            let blinded = pseudonym_in_transit.pseudonym().point().multiply(&random)?;
            inputs.push(self.domain.request_payload_value(
                &blinded,
                Some(pseudonym_in_transit.transit_info().as_str()),
            ));
            randoms.push(random);
        }

        debug!(count = self.len(), domain = self.domain.key(), "identify batch");
        let body = json!({ "inputs": inputs }).to_string();
        let raw = client.identify_multiple(self.domain.key(), &body).await?;
        let outputs = parse_outputs(&raw, randoms.len())?;

        let factory = PseudonymFactory::new(self.domain.clone());
        for (output, random) in outputs.iter().zip(&randoms) {
            result.push_outcome(
                factory
                    .from_response(output, random)
                    .map(|pseudonym| pseudonym.as_value()),
            )?;
        }
        Ok(result)
    }

    /// Convert all pseudonyms in transit to another domain.
    pub async fn convert_to(
        &self,
        to_domain: &Domain,
    ) -> CoreResult<MultiplePseudonymInTransit> {
        let mut result = MultiplePseudonymInTransit::new(to_domain.clone());
        if self.is_empty() {
            return Ok(result);
        }
        if self.len() == 1 {
            result.push_outcome(self.get(0)?.convert_to(to_domain).await)?;
            return Ok(result);
        }

        let client = self.domain.require_client()?;
        let mut randoms: Vec<Scalar> = Vec::with_capacity(self.len());
        let mut inputs: Vec<Json> = Vec::with_capacity(self.len());
        for pseudonym_in_transit in self.points()? {
            let random = self.domain.create_random();
            let blinded = pseudonym_in_transit.pseudonym().point().multiply(&random)?;
            inputs.push(self.domain.request_payload_value(
                &blinded,
                Some(pseudonym_in_transit.transit_info().as_str()),
            ));
            randoms.push(random);
        }

        let body = json!({ "inputs": inputs }).to_string();
        let raw = client
            .convert_multiple_to(self.domain.key(), to_domain.key(), &body)
            .await?;
        let outputs = parse_outputs(&raw, randoms.len())?;

        let factory = PseudonymInTransitFactory::new(to_domain.clone());
        for (output, random) in outputs.iter().zip(&randoms) {
            result.push_outcome(factory.from_response(output, random))?;
        }
        Ok(result)
    }
}

/// Extract `outputs` and insist on one output per input.
///
/// The service contract returns outputs in input order; a length mismatch
/// would silently pair results with the wrong blinding scalars, so it is a
/// hard error.
fn parse_outputs(raw_response: &str, expected: usize) -> CoreResult<Vec<Json>> {
    let response: Json = serde_json::from_str(raw_response)
        .map_err(|e| CoreError::UnexpectedResponse(format!("malformed response: {e}")))?;
    let outputs = response
        .get("outputs")
        .and_then(Json::as_array)
        .ok_or_else(|| {
            CoreError::UnexpectedResponse("response does not contain an `outputs` array".into())
        })?;
    if outputs.len() != expected {
        return Err(CoreError::UnexpectedResponse(format!(
            "expected {expected} outputs, got {}",
            outputs.len()
        )));
    }
    Ok(outputs.clone())
}
