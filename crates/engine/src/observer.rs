use database::StatementResult;
use std::sync::Arc;

/// Lifecycle hooks around one pipeline run. Every hook has a no-op default.
pub trait RunObserver: Send + Sync {
    fn start_run(&self, _user_input: &str) {}
    fn router_response(&self, _content: Option<&str>, _tool_calls: &[String]) {}
    fn table_metadata(&self, _metadata: &str) {}
    fn required_tables(&self, _tables: &[String]) {}
    fn sql_code(&self, _sql: &str) {}
    fn sql_results(&self, _results: &[StatementResult]) {}
    fn chart(&self, _rendered: bool) {}
    fn polish_prompt(&self, _prompt: Option<&str>) {}
    fn final_response(&self, _response: &str) {}
    fn error(&self, _message: &str) {}
    fn end_run(&self) {}
}

/// Emits every hook as a structured `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl RunObserver for TracingObserver {
    fn start_run(&self, user_input: &str) {
        tracing::info!(user_input, "Run started");
    }

    fn router_response(&self, content: Option<&str>, tool_calls: &[String]) {
        tracing::info!(?tool_calls, has_content = content.is_some(), "Router responded");
    }

    fn table_metadata(&self, metadata: &str) {
        tracing::debug!(chars = metadata.len(), "Table metadata retrieved");
    }

    fn required_tables(&self, tables: &[String]) {
        tracing::info!(?tables, "Required tables");
    }

    fn sql_code(&self, sql: &str) {
        tracing::info!(sql, "Generated SQL");
    }

    fn sql_results(&self, results: &[StatementResult]) {
        let failed = results.iter().filter(|r| !r.is_success()).count();
        tracing::info!(statements = results.len(), failed, "SQL executed");
    }

    fn chart(&self, rendered: bool) {
        tracing::info!(rendered, "Chart generated");
    }

    fn polish_prompt(&self, prompt: Option<&str>) {
        tracing::debug!(built = prompt.is_some(), "Polish prompt");
    }

    fn final_response(&self, response: &str) {
        tracing::debug!(chars = response.len(), "Final response");
    }

    fn error(&self, message: &str) {
        tracing::error!(message, "Pipeline error");
    }

    fn end_run(&self) {
        tracing::info!("Run finished");
    }
}

/// Starts a run on creation and ends it when dropped, on every exit path.
pub(crate) struct RunGuard {
    observer: Arc<dyn RunObserver>,
}

impl RunGuard {
    pub(crate) fn start(observer: Arc<dyn RunObserver>, user_input: &str) -> Self {
        observer.start_run(user_input);
        Self { observer }
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.observer.end_run();
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Records hook names in call order.
    #[derive(Default)]
    pub struct RecordingObserver {
        pub events: Mutex<Vec<String>>,
    }

    impl RecordingObserver {
        fn push(&self, event: &str) {
            self.events.lock().unwrap().push(event.to_string());
        }

        pub fn events(&self) -> Vec<String> {
            self.events.lock().unwrap().clone()
        }
    }

    impl RunObserver for RecordingObserver {
        fn start_run(&self, _user_input: &str) {
            self.push("start");
        }
        fn sql_results(&self, _results: &[StatementResult]) {
            self.push("sql_results");
        }
        fn final_response(&self, _response: &str) {
            self.push("final_response");
        }
        fn error(&self, _message: &str) {
            self.push("error");
        }
        fn end_run(&self) {
            self.push("end");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingObserver;
    use super::*;

    #[test]
    fn guard_ends_run_on_drop() {
        let observer = Arc::new(RecordingObserver::default());
        {
            let _guard = RunGuard::start(observer.clone(), "q");
        }
        assert_eq!(observer.events(), vec!["start", "end"]);
    }
}
