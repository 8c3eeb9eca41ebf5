use std::error::Error;

/// Renders an error followed by each of its causes, separated by `: `.
///
/// Wrapping errors keep their own message short and leave the cause to
/// `source()`, so single-line log fields need the whole chain spelled out.
pub fn render_chain(err: &dyn Error) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}
