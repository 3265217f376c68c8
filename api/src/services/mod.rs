pub mod cache;
pub mod events;
pub mod fallback;
pub mod forecast;
pub mod history;
pub mod lookup;
pub mod observations;
pub mod providers;
pub mod weather;

#[cfg(test)]
pub(crate) mod testing;
