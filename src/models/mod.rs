pub mod course;
pub mod enrollment;
pub mod progress;
pub mod quiz;
pub mod user;

pub use course::{AnswerOption, Course, CourseModule, Question, Quiz};
pub use enrollment::{
    CourseEnrollmentLimit, Decision, DecisionRequest, EnrollmentRequest, EnrollmentStatus,
    NewEnrollmentRequest, RevokeRequest, SetLimitRequest, WithdrawRequest,
};
pub use progress::{CompletionRate, CourseProgressOverview, ProgressSnapshot, StudentRollUp};
pub use quiz::{AnswerSelection, QuizAttempt, SubmitQuizRequest};
pub use user::{User, UserRole};
