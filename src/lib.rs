// Practice Queue library entry
// 练习队列引擎：会话模式解析、补题状态机、复习提交流水线与外部服务客户端。

pub mod clients;
pub mod logging;
pub mod practice;

pub use clients::{
    CachedFrontierClient, ConceptFrontierClient, DrillGeneratorClient, HttpPracticeClient,
    ReviewSubmissionClient,
};
pub use practice::{
    GradeInput, PracticeClients, PracticeConfig, PracticeError, PracticeResult, PracticeSession,
    Rating, SessionEvent, SessionMode, SessionPhase, SessionSnapshot,
};
