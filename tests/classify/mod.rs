mod adversarial;
mod cache_roundtrip;
mod concurrency;
mod handle;
mod infer_agreement;
mod scenarios;
