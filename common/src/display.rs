use crate::frame::Frame;

/// Output side of a reading session.
///
/// Each method updates one display region and replaces whatever that region
/// showed before. Implementations must not block for long: they are called
/// from the capture loop once per frame.
pub trait DisplaySink {
    /// Replace the video image with an annotated, display-ordered frame.
    fn show_frame(&mut self, frame: &Frame);

    /// Show the most recent previously unseen code.
    fn show_last_code(&mut self, code: &str);

    /// Show the number of unique codes seen so far.
    fn show_count(&mut self, count: usize);

    /// Replace the code table. One row per unique code.
    fn show_table(&mut self, rows: &[String]);

    /// Show a terminal error message. Other regions keep their last content.
    fn show_error(&mut self, message: &str);
}
