pub mod retry;
pub mod upload;
pub mod video_service;
pub mod payment_service;
pub mod translation_service;
