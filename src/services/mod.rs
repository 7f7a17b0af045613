pub mod assessment;
pub mod mailer;
pub mod video_analysis;
