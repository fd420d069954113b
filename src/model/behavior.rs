//! Node behaviors - the opaque, user-supplied part of each node kind
//!
//! The engine only depends on these traits, one per node contract:
//! - [`Transform`]: Execution nodes, `input → output`
//! - [`Predicate`]: Conditional nodes, `input → bool`
//! - [`LoopPredicate`]: Loop nodes, `(carried, iteration) → bool`
//! - [`Reducer`]: Aggregator nodes, `inputs[] → output`
//!
//! Closures are adapted with [`transform_fn`], [`predicate_fn`],
//! [`loop_predicate_fn`] and [`reducer_fn`].

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

/// Execution node behavior
#[async_trait]
pub trait Transform: Send + Sync {
    async fn apply(&self, input: Value) -> anyhow::Result<Value>;
}

/// Conditional node behavior
#[async_trait]
pub trait Predicate: Send + Sync {
    async fn evaluate(&self, input: &Value) -> anyhow::Result<bool>;
}

/// Loop node behavior, evaluated before every iteration (starting at 0)
#[async_trait]
pub trait LoopPredicate: Send + Sync {
    async fn should_continue(&self, carried: &Value, iteration: u32) -> anyhow::Result<bool>;
}

/// Aggregator node behavior
///
/// `inputs` follows the aggregator's declared input-port order, never arrival order.
#[async_trait]
pub trait Reducer: Send + Sync {
    async fn reduce(&self, inputs: Vec<Value>) -> anyhow::Result<Value>;
}

// ═══════════════════════════════════════════════════════════════
// Closure adapters
// ═══════════════════════════════════════════════════════════════

struct FnTransform<F>(F);

#[async_trait]
impl<F, Fut> Transform for FnTransform<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Value>> + Send,
{
    async fn apply(&self, input: Value) -> anyhow::Result<Value> {
        (self.0)(input).await
    }
}

/// Wrap an async closure as a [`Transform`]
pub fn transform_fn<F, Fut>(f: F) -> Arc<dyn Transform>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    Arc::new(FnTransform(f))
}

struct FnPredicate<F>(F);

#[async_trait]
impl<F, Fut> Predicate for FnPredicate<F>
where
    F: Fn(Value) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<bool>> + Send,
{
    async fn evaluate(&self, input: &Value) -> anyhow::Result<bool> {
        (self.0)(input.clone()).await
    }
}

/// Wrap an async closure as a [`Predicate`] (the closure receives an owned copy)
pub fn predicate_fn<F, Fut>(f: F) -> Arc<dyn Predicate>
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<bool>> + Send + 'static,
{
    Arc::new(FnPredicate(f))
}

struct FnLoopPredicate<F>(F);

#[async_trait]
impl<F, Fut> LoopPredicate for FnLoopPredicate<F>
where
    F: Fn(Value, u32) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<bool>> + Send,
{
    async fn should_continue(&self, carried: &Value, iteration: u32) -> anyhow::Result<bool> {
        (self.0)(carried.clone(), iteration).await
    }
}

/// Wrap an async closure as a [`LoopPredicate`]
pub fn loop_predicate_fn<F, Fut>(f: F) -> Arc<dyn LoopPredicate>
where
    F: Fn(Value, u32) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<bool>> + Send + 'static,
{
    Arc::new(FnLoopPredicate(f))
}

struct FnReducer<F>(F);

#[async_trait]
impl<F, Fut> Reducer for FnReducer<F>
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync,
    Fut: Future<Output = anyhow::Result<Value>> + Send,
{
    async fn reduce(&self, inputs: Vec<Value>) -> anyhow::Result<Value> {
        (self.0)(inputs).await
    }
}

/// Wrap an async closure as a [`Reducer`]
pub fn reducer_fn<F, Fut>(f: F) -> Arc<dyn Reducer>
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<Value>> + Send + 'static,
{
    Arc::new(FnReducer(f))
}
