/// Prompt templates sent to the inference endpoint.
///
/// The analysis prompt is a fixed constant by design: callers supply only
/// the extracted log text.

pub fn analysis_prompt(error_log: &str) -> String {
    format!(
        "You are an expert DevOps AI assistant.\n\
         \n\
         Analyze the following Apache Tomcat log.\n\
         Identify the root cause clearly.\n\
         Include probable solutions.\n\
         \n\
         Log:\n\
         {error_log}\n"
    )
}
