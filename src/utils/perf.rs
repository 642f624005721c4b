/// Runs `$block` and warns when it takes longer than `$limit_ms` milliseconds.
/// Timing is skipped entirely unless `DF.log_performance` is set.
///
/// ```ignore
/// let artifact = trace_time!("train fourHour", 1_000, { backend.train(..) });
/// ```
#[macro_export]
macro_rules! trace_time {
    ($name:expr, $limit_ms:expr, $block:block) => {{
        if $crate::config::DF.log_performance {
            let started = std::time::Instant::now();
            let result = $block;
            let elapsed = started.elapsed();
            let limit = std::time::Duration::from_millis($limit_ms);
            if elapsed > limit {
                log::warn!("🐢 '{}' took {:.1?} (limit {:?})", $name, elapsed, limit);
            } else {
                log::debug!("⏱️ '{}' took {:.1?}", $name, elapsed);
            }
            result
        } else {
            $block
        }
    }};
}
