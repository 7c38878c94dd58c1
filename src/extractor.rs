use once_cell::sync::Lazy;
use regex::Regex;

/// Matches lines that likely belong to an error or exception region of a
/// Tomcat log: severity markers, Java exception names, chained-cause
/// headers, and stack-trace frames (`at ...`, with optional indentation).
static TRIGGER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"SEVERE|Exception|ERROR|Caused by|^\s*at ").unwrap());

/// Whether a single log line marks the start (or continuation) of an
/// error block. Pure predicate, no state.
pub fn is_trigger_line(line: &str) -> bool {
    TRIGGER.is_match(line)
}

/// Extract likely error/exception blocks from raw log text.
///
/// A trigger line opens a capture window (or refreshes the one already
/// open). While a window is open every line is captured, up to `max_lines`
/// lines past the most recent trigger. Recurring triggers reset the counter
/// without closing the window, so consecutive exceptions merge into one
/// block rather than being truncated mid-stack-trace.
///
/// Returns the captured lines joined with `\n`; empty string when nothing
/// triggers.
pub fn extract_error_blocks(log_text: &str, max_lines: usize) -> String {
    let mut captured: Vec<&str> = Vec::new();
    let mut capturing = false;
    let mut count = 0usize;

    for line in log_text.lines() {
        if is_trigger_line(line) {
            capturing = true;
            count = 0;
        }
        if capturing {
            captured.push(line);
            count += 1;
        }
        if capturing && count > max_lines {
            capturing = false;
            count = 0;
        }
    }

    captured.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn no_trigger_yields_empty_output() {
        let log = "INFO startup\nINFO listening on 8080\nINFO ready\n";
        assert_eq!(extract_error_blocks(log, 300), "");
    }

    #[test]
    fn trigger_captures_following_context() {
        let log = "INFO ok\nERROR bad\nmore context\n";
        let out = extract_error_blocks(log, 2);
        assert!(out.contains("ERROR bad"));
        assert!(out.contains("more context"));
        assert!(!out.contains("INFO ok"));
    }

    #[test]
    fn isolated_trigger_truncates_after_max_lines() {
        let mut log = String::from("ERROR boom\n");
        for i in 0..10 {
            log.push_str(&format!("context {i}\n"));
        }
        let out = extract_error_blocks(&log, 3);
        // trigger line plus three lines of context, nothing beyond
        assert_eq!(out, "ERROR boom\ncontext 0\ncontext 1\ncontext 2");
    }

    #[test]
    fn recurring_triggers_extend_the_window() {
        // Second trigger arrives past the bound of the first window but the
        // stack frames between them keep the window open throughout.
        let log = "SEVERE: request failed\n\
                   java.lang.NullPointerException: oops\n\
                   \tat com.example.Handler.handle(Handler.java:42)\n\
                   \tat com.example.Server.dispatch(Server.java:10)\n\
                   Caused by: java.io.IOException: broken pipe\n\
                   \tat com.example.Io.write(Io.java:7)\n";
        let out = extract_error_blocks(log, 2);
        assert_eq!(out, log.trim_end_matches('\n'));
    }

    #[test]
    fn lines_between_blocks_are_dropped() {
        let log = "ERROR one\nINFO noise\nINFO noise\nINFO noise\nERROR two\n";
        let out = extract_error_blocks(log, 1);
        assert_eq!(out, "ERROR one\nINFO noise\nERROR two");
    }

    #[test]
    fn trigger_predicate_matches_known_markers() {
        assert!(is_trigger_line("12-Jan-2024 SEVERE [main] boot failed"));
        assert!(is_trigger_line("java.lang.IllegalStateException: nope"));
        assert!(is_trigger_line("2024-01-12 ERROR dispatcher"));
        assert!(is_trigger_line("Caused by: java.io.IOException"));
        assert!(is_trigger_line("\tat org.apache.catalina.core.StandardWrapperValve.invoke(StandardWrapperValve.java:177)"));
        assert!(is_trigger_line("    at com.example.App.main(App.java:5)"));
        assert!(!is_trigger_line("INFO server started in 1200ms"));
        // "at " only counts as a stack frame at the start of the line
        assert!(!is_trigger_line("INFO listening at port 8080"));
    }
}
