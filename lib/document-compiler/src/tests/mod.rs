mod cycles;
mod pipelines;
mod scenarios;
pub(crate) mod testkit;
