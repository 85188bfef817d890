pub mod attendance;
pub mod child;
pub mod contact;
pub mod enrollment;
pub mod event;
pub mod feedback;
pub mod gallery;
pub mod group;
pub mod journal;
pub mod menu;
pub mod message;
pub mod payment;
pub mod user;

pub use attendance::{
    AttendanceInput, AttendanceRecord, AttendanceStatus, BulkAttendanceRequest, DaySheetRow,
    MarkAttendanceRequest,
};
pub use child::{Child, ChildRequest, Gender};
pub use contact::{ContactMessage, ContactRequest};
pub use enrollment::{
    Enrollment, EnrollmentRequest, EnrollmentStatus, EnrollmentStatusView, ReviewEnrollmentRequest,
};
pub use event::{Event, EventRequest, Rsvp, RsvpRequest, RsvpResponse, RsvpSummary};
pub use feedback::{Feedback, FeedbackCategory, FeedbackRequest, FeedbackStatus, FeedbackStatusRequest};
pub use gallery::{GalleryItem, GalleryItemResponse, UpdateGalleryItemRequest};
pub use group::{Group, GroupRequest};
pub use journal::{Appetite, JournalEntry, JournalRequest, Mood};
pub use menu::{CopyWeekRequest, Dish, DishRequest, Ingredient, MealType, MenuEntry, Nutrition, SetMenuSlotRequest};
pub use message::{Audience, BroadcastRequest, Message, Notification, NotificationKind, SendMessageRequest};
pub use payment::{
    GeneratePaymentsRequest, PayRequest, Payment, PaymentMethod, PaymentRequest, PaymentStatus,
    UpdatePaymentRequest,
};
pub use user::{
    AuthSession, ChangePasswordRequest, CreateUserRequest, LoginRequest, RegisterRequest, Role,
    UpdateUserRequest, User,
};
