pub use cv_core as core;
pub use cv_eval as eval;
pub use cv_features as features;
pub use cv_io as io;
pub use cv_point_cloud as point_cloud;
pub use cv_registration as registration;

/// Initialize a single global Rayon thread pool for the data-parallel
/// feature-extraction loops.
///
/// Call this once at application startup before running a batch.
/// Repeated calls are idempotent and return the first initialization result.
///
/// Priority order:
/// 1. explicit `num_threads`
/// 2. `CVREC_CPU_THREADS` env var
/// 3. Rayon default
pub fn init_thread_pool(num_threads: Option<usize>) -> Result<(), String> {
    cv_core::init_global_thread_pool(num_threads)
}
