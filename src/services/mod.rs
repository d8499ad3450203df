pub mod enrollment;
pub mod progress;
pub mod quiz;

pub use enrollment::EnrollmentService;
pub use progress::ProgressService;
pub use quiz::QuizService;
