//! The fixed remote web-service contract for lessons.
//!
//! Only the contract lives here: `LessonRemote` is the seam the rest of the
//! services are written against, and `HttpLessonRemote` is the production
//! client speaking the JSON web-service dialect. Response shapes vary by
//! page subtype and are full of optional fields, so they are decoded into
//! wire structs at this boundary and converted to the typed domain model.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use lesson_core::model::{
    AccessInfo, AnswerId, AttemptData, CourseId, Jump, Lesson, LessonId, LessonPage, PageAnswer,
    PageId, PageIndex, PageSubtype, PossibleJumps, PreventReason, QuestionAttempt, UserResponse,
};

use crate::error::RemoteError;

/// Outcome of submitting one page answer to the server.
#[derive(Debug, Clone, Default)]
pub struct ProcessPageOutcome {
    pub new_page_id: Option<PageId>,
    pub correct: bool,
    pub warnings: Vec<String>,
}

/// Outcome of finishing a retake on the server.
#[derive(Debug, Clone, Default)]
pub struct FinishRetakeOutcome {
    /// Page to start reviewing from, when the finished retake is
    /// reviewable.
    pub review_page_id: Option<PageId>,
    pub progress: Option<f64>,
}

/// Aggregate numbers from the retakes overview report.
#[derive(Debug, Clone, Default)]
pub struct RetakesOverview {
    pub num_attempts: u32,
    pub avg_score: Option<f64>,
    pub high_score: Option<f64>,
    pub low_score: Option<f64>,
}

/// Summary of one finished retake of a user.
#[derive(Debug, Clone, Default)]
pub struct UserRetake {
    pub retake: u32,
    pub completed: bool,
    pub grade: Option<f64>,
}

/// One lesson timer session of a user.
#[derive(Debug, Clone, Default)]
pub struct UserTimer {
    pub start_time: i64,
    pub lesson_time: i64,
    pub completed: bool,
}

/// The remote lesson operations, as given by the server contract.
#[async_trait]
pub trait LessonRemote: Send + Sync {
    async fn get_lesson_by_id(
        &self,
        course_id: CourseId,
        lesson_id: LessonId,
    ) -> Result<Lesson, RemoteError>;

    /// Fetch the lesson unlocking protected fields with a password.
    ///
    /// Doubles as password validation: a wrong password is a business
    /// rejection.
    async fn get_lesson_with_password(
        &self,
        lesson_id: LessonId,
        password: Option<&str>,
    ) -> Result<Lesson, RemoteError>;

    async fn get_access_information(&self, lesson_id: LessonId)
    -> Result<AccessInfo, RemoteError>;

    /// The page list, without per-page answers.
    async fn get_pages(
        &self,
        lesson_id: LessonId,
        password: Option<&str>,
    ) -> Result<Vec<LessonPage>, RemoteError>;

    /// One page with its configured answers.
    async fn get_page_data(
        &self,
        lesson_id: LessonId,
        page_id: PageId,
        password: Option<&str>,
    ) -> Result<LessonPage, RemoteError>;

    async fn get_pages_possible_jumps(
        &self,
        lesson_id: LessonId,
    ) -> Result<PossibleJumps, RemoteError>;

    /// Question attempts the server knows about for a retake.
    async fn get_questions_attempts(
        &self,
        lesson_id: LessonId,
        retake: u32,
    ) -> Result<Vec<QuestionAttempt>, RemoteError>;

    /// Content pages the server recorded as viewed in a retake.
    async fn get_content_pages_viewed(
        &self,
        lesson_id: LessonId,
        retake: u32,
    ) -> Result<Vec<PageId>, RemoteError>;

    async fn process_page(
        &self,
        lesson_id: LessonId,
        page_id: PageId,
        data: &AttemptData,
        password: Option<&str>,
    ) -> Result<ProcessPageOutcome, RemoteError>;

    async fn finish_retake(
        &self,
        lesson_id: LessonId,
        password: Option<&str>,
        out_of_time: bool,
        review: bool,
    ) -> Result<FinishRetakeOutcome, RemoteError>;

    async fn launch_retake(
        &self,
        lesson_id: LessonId,
        password: Option<&str>,
        page_id: Option<PageId>,
        review: bool,
    ) -> Result<(), RemoteError>;

    async fn get_retakes_overview(
        &self,
        lesson_id: LessonId,
    ) -> Result<RetakesOverview, RemoteError>;

    async fn get_user_retake(
        &self,
        lesson_id: LessonId,
        retake: u32,
    ) -> Result<UserRetake, RemoteError>;

    async fn get_user_timers(&self, lesson_id: LessonId) -> Result<Vec<UserTimer>, RemoteError>;

    /// Full page index with answers, composed from `get_pages` plus a
    /// `get_page_data` call per page.
    async fn load_page_index(
        &self,
        lesson_id: LessonId,
        password: Option<&str>,
    ) -> Result<PageIndex, RemoteError> {
        let pages = self.get_pages(lesson_id, password).await?;
        let mut full = Vec::with_capacity(pages.len());
        for page in pages {
            full.push(self.get_page_data(lesson_id, page.id, password).await?);
        }
        Ok(PageIndex::from_pages(full))
    }
}

/// Endpoint and token for the production web-service client.
#[derive(Clone, Debug)]
pub struct RemoteConfig {
    pub base_url: String,
    pub token: String,
}

/// HTTP client for the lesson web services.
#[derive(Clone)]
pub struct HttpLessonRemote {
    client: Client,
    config: RemoteConfig,
}

impl HttpLessonRemote {
    #[must_use]
    pub fn new(config: RemoteConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    async fn call<T: serde::de::DeserializeOwned>(
        &self,
        function: &str,
        params: &[(String, String)],
    ) -> Result<T, RemoteError> {
        let url = format!(
            "{}/webservice/rest/server.php",
            self.config.base_url.trim_end_matches('/')
        );

        let mut form: Vec<(String, String)> = vec![
            ("wstoken".into(), self.config.token.clone()),
            ("wsfunction".into(), function.to_string()),
            ("moodlewsrestformat".into(), "json".into()),
        ];
        form.extend_from_slice(params);

        let response = self.client.post(url).form(&form).send().await?;
        if !response.status().is_success() {
            return Err(RemoteError::Transport(format!(
                "unexpected status {}",
                response.status()
            )));
        }

        let body: serde_json::Value = response.json().await?;

        // A well-formed error body means the server judged and rejected the
        // request; anything else wrong with the payload is transport-level.
        if let Some(exception) = body.get("exception") {
            let code = body
                .get("errorcode")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            let message = body
                .get("message")
                .and_then(|v| v.as_str())
                .unwrap_or_else(|| exception.as_str().unwrap_or("rejected"))
                .to_string();
            return Err(RemoteError::Business { code, message });
        }

        serde_json::from_value(body).map_err(|e| RemoteError::Transport(e.to_string()))
    }
}

fn lesson_param(lesson_id: LessonId) -> (String, String) {
    ("lessonid".into(), lesson_id.to_string())
}

fn password_param(params: &mut Vec<(String, String)>, password: Option<&str>) {
    if let Some(password) = password {
        params.push(("password".into(), password.to_string()));
    }
}

/// Flatten a typed submission back into the form-field pairs the
/// web service expects.
fn form_fields(data: &AttemptData) -> Vec<(String, String)> {
    match data {
        AttemptData::Content { jump } => vec![("jumpto".into(), jump.code().to_string())],
        AttemptData::ShortAnswer { answer } | AttemptData::Numerical { answer } => {
            vec![("answer".into(), answer.clone())]
        }
        AttemptData::TrueFalse { answer_id } => {
            vec![("answerid".into(), answer_id.to_string())]
        }
        AttemptData::Multichoice { answer_id } => match answer_id {
            Some(id) => vec![("answerid".into(), id.to_string())],
            None => Vec::new(),
        },
        AttemptData::MultichoiceMulti { answer_ids } => answer_ids
            .iter()
            .enumerate()
            .map(|(i, id)| (format!("answer[{i}]"), id.to_string()))
            .collect(),
        AttemptData::Matching { responses } => responses
            .iter()
            .map(|(id, value)| (format!("response[{id}]"), value.clone()))
            .collect(),
        AttemptData::Essay { text } => vec![
            ("answer_editor[text]".into(), text.clone()),
            ("answer_editor[format]".into(), "1".into()),
        ],
    }
}

fn data_params(data: &AttemptData) -> Vec<(String, String)> {
    form_fields(data)
        .into_iter()
        .enumerate()
        .flat_map(|(i, (name, value))| {
            [
                (format!("data[{i}][name]"), name),
                (format!("data[{i}][value]"), value),
            ]
        })
        .collect()
}

//
// ─── WIRE STRUCTS ──────────────────────────────────────────────────────────────
//

fn flag(v: Option<i64>) -> bool {
    v.unwrap_or(0) != 0
}

#[derive(Deserialize)]
struct WsLesson {
    id: u64,
    course: u64,
    name: String,
    custom: Option<i64>,
    maxattempts: Option<u32>,
    minquestions: Option<u32>,
    retake: Option<i64>,
    feedback: Option<i64>,
    modattempts: Option<i64>,
    grade: Option<i64>,
    timelimit: Option<u32>,
    allowofflineattempts: Option<i64>,
}

impl WsLesson {
    fn into_lesson(self) -> Lesson {
        Lesson {
            id: LessonId::new(self.id),
            course_id: CourseId::new(self.course),
            name: self.name,
            custom_scoring: flag(self.custom),
            max_attempts: self.maxattempts.unwrap_or(0),
            min_questions: self.minquestions.unwrap_or(0),
            retake_allowed: flag(self.retake),
            feedback: flag(self.feedback),
            review_allowed: flag(self.modattempts),
            grade: self.grade.and_then(|g| u32::try_from(g).ok()).filter(|g| *g > 0),
            time_limit: self.timelimit.unwrap_or(0),
            allow_offline_attempts: flag(self.allowofflineattempts),
        }
    }
}

#[derive(Deserialize)]
struct WsLessonResponse {
    lesson: WsLesson,
}

#[derive(Deserialize)]
struct WsPreventReason {
    reason: String,
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct WsAccessInfo {
    attemptscount: u32,
    canmanage: Option<bool>,
    canviewreports: Option<bool>,
    firstpageid: u64,
    leftduringtimedsession: Option<bool>,
    #[serde(default)]
    preventaccessreasons: Vec<WsPreventReason>,
}

impl WsAccessInfo {
    fn into_access_info(self) -> AccessInfo {
        AccessInfo {
            attempts_count: self.attemptscount,
            can_manage: self.canmanage.unwrap_or(false),
            can_view_reports: self.canviewreports.unwrap_or(false),
            first_page_id: PageId::new(self.firstpageid),
            left_during_timed: self.leftduringtimedsession.unwrap_or(false),
            prevent_access_reasons: self
                .preventaccessreasons
                .into_iter()
                .map(|r| PreventReason {
                    reason: r.reason,
                    message: r.message,
                })
                .collect(),
        }
    }
}

#[derive(Deserialize)]
struct WsPage {
    id: u64,
    #[serde(default)]
    title: String,
    qtype: i64,
    nextpageid: Option<u64>,
    qoption: Option<i64>,
}

impl WsPage {
    fn into_page(self, answers: Vec<PageAnswer>) -> Result<LessonPage, RemoteError> {
        let subtype = PageSubtype::from_code(self.qtype).ok_or_else(|| {
            RemoteError::Transport(format!("unknown page subtype {}", self.qtype))
        })?;
        Ok(LessonPage {
            id: PageId::new(self.id),
            title: self.title,
            subtype,
            next_page_id: self.nextpageid.filter(|id| *id != 0).map(PageId::new),
            use_option: flag(self.qoption),
            answers,
        })
    }
}

#[derive(Deserialize)]
struct WsPagesEntry {
    page: WsPage,
}

#[derive(Deserialize)]
struct WsPagesResponse {
    pages: Vec<WsPagesEntry>,
}

#[derive(Deserialize)]
struct WsAnswer {
    id: u64,
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    response: Option<String>,
    jumpto: Option<i64>,
    score: Option<i64>,
}

#[derive(Deserialize)]
struct WsPageDataResponse {
    page: WsPage,
    #[serde(default)]
    answers: Vec<WsAnswer>,
}

#[derive(Deserialize)]
struct WsJump {
    pageid: u64,
    jumpto: i64,
    calculatedjump: i64,
}

#[derive(Deserialize)]
struct WsJumpsResponse {
    jumps: Vec<WsJump>,
}

#[derive(Deserialize)]
struct WsQuestionAttempt {
    pageid: u64,
    timeseen: i64,
    answerid: Option<u64>,
    correct: Option<i64>,
    useranswer: Option<String>,
}

#[derive(Deserialize)]
struct WsQuestionAttemptsResponse {
    attempts: Vec<WsQuestionAttempt>,
}

#[derive(Deserialize)]
struct WsContentPageViewed {
    pageid: u64,
}

#[derive(Deserialize)]
struct WsContentPagesResponse {
    pages: Vec<WsContentPageViewed>,
}

#[derive(Deserialize)]
struct WsProcessPageResponse {
    newpageid: Option<i64>,
    #[serde(default)]
    correctanswer: bool,
    #[serde(default)]
    warnings: Vec<WsWarning>,
}

#[derive(Deserialize)]
struct WsWarning {
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct WsEolEntry {
    name: String,
    value: serde_json::Value,
}

#[derive(Deserialize)]
struct WsFinishResponse {
    #[serde(default)]
    data: Vec<WsEolEntry>,
}

#[derive(Deserialize)]
struct WsOverviewNumbers {
    numofattempts: Option<u32>,
    avgscore: Option<f64>,
    highscore: Option<f64>,
    lowscore: Option<f64>,
}

#[derive(Deserialize)]
struct WsOverviewResponse {
    data: Option<WsOverviewNumbers>,
}

#[derive(Deserialize)]
struct WsUserStats {
    #[serde(default)]
    completed: i64,
    grade: Option<f64>,
}

#[derive(Deserialize)]
struct WsUserRetakeResponse {
    userstats: WsUserStats,
}

#[derive(Deserialize)]
struct WsTimer {
    starttime: i64,
    lessontime: i64,
    completed: Option<i64>,
}

#[derive(Deserialize)]
struct WsTimersResponse {
    timers: Vec<WsTimer>,
}

/// Pull the review page id out of the finish response's `reviewlesson`
/// URL entry.
fn review_page_id(entries: &[WsEolEntry]) -> Option<PageId> {
    let entry = entries.iter().find(|e| e.name == "reviewlesson")?;
    let raw = entry.value.as_str()?;
    let url = Url::parse(raw).ok()?;
    let pageid = url
        .query_pairs()
        .find(|(k, _)| k == "pageid")
        .map(|(_, v)| v.into_owned())?;
    pageid.parse::<u64>().ok().map(PageId::new)
}

fn eol_number(entries: &[WsEolEntry], name: &str) -> Option<f64> {
    entries
        .iter()
        .find(|e| e.name == name)
        .and_then(|e| e.value.as_f64())
}

#[async_trait]
impl LessonRemote for HttpLessonRemote {
    async fn get_lesson_by_id(
        &self,
        course_id: CourseId,
        lesson_id: LessonId,
    ) -> Result<Lesson, RemoteError> {
        #[derive(Deserialize)]
        struct WsLessonsResponse {
            lessons: Vec<WsLesson>,
        }

        let response: WsLessonsResponse = self
            .call(
                "mod_lesson_get_lessons_by_courses",
                &[("courseids[0]".into(), course_id.to_string())],
            )
            .await?;

        response
            .lessons
            .into_iter()
            .find(|l| l.id == lesson_id.value())
            .map(WsLesson::into_lesson)
            .ok_or_else(|| RemoteError::Business {
                code: "invalidrecord".into(),
                message: format!("lesson {lesson_id} not found in course {course_id}"),
            })
    }

    async fn get_lesson_with_password(
        &self,
        lesson_id: LessonId,
        password: Option<&str>,
    ) -> Result<Lesson, RemoteError> {
        let mut params = vec![lesson_param(lesson_id)];
        password_param(&mut params, password);

        let response: WsLessonResponse = self.call("mod_lesson_get_lesson", &params).await?;
        Ok(response.lesson.into_lesson())
    }

    async fn get_access_information(
        &self,
        lesson_id: LessonId,
    ) -> Result<AccessInfo, RemoteError> {
        let response: WsAccessInfo = self
            .call(
                "mod_lesson_get_lesson_access_information",
                &[lesson_param(lesson_id)],
            )
            .await?;
        Ok(response.into_access_info())
    }

    async fn get_pages(
        &self,
        lesson_id: LessonId,
        password: Option<&str>,
    ) -> Result<Vec<LessonPage>, RemoteError> {
        let mut params = vec![lesson_param(lesson_id)];
        password_param(&mut params, password);

        let response: WsPagesResponse = self.call("mod_lesson_get_pages", &params).await?;
        response
            .pages
            .into_iter()
            .map(|entry| entry.page.into_page(Vec::new()))
            .collect()
    }

    async fn get_page_data(
        &self,
        lesson_id: LessonId,
        page_id: PageId,
        password: Option<&str>,
    ) -> Result<LessonPage, RemoteError> {
        let mut params = vec![
            lesson_param(lesson_id),
            ("pageid".into(), page_id.to_string()),
            ("returncontents".into(), "1".into()),
        ];
        password_param(&mut params, password);

        let response: WsPageDataResponse = self.call("mod_lesson_get_page_data", &params).await?;
        let answers = response
            .answers
            .into_iter()
            .map(|a| PageAnswer {
                id: AnswerId::new(a.id),
                page_id,
                answer: a.answer.unwrap_or_default(),
                response: a.response.unwrap_or_default(),
                jump: Jump::from_code(a.jumpto.unwrap_or(0)),
                score: a.score.unwrap_or(0),
            })
            .collect();
        response.page.into_page(answers)
    }

    async fn get_pages_possible_jumps(
        &self,
        lesson_id: LessonId,
    ) -> Result<PossibleJumps, RemoteError> {
        let response: WsJumpsResponse = self
            .call(
                "mod_lesson_get_pages_possible_jumps",
                &[lesson_param(lesson_id)],
            )
            .await?;

        let mut jumps = PossibleJumps::new();
        for entry in response.jumps {
            let calculated = (entry.calculatedjump > 0)
                .then(|| PageId::new(entry.calculatedjump as u64));
            jumps.insert(
                PageId::new(entry.pageid),
                Jump::from_code(entry.jumpto),
                calculated,
            );
        }
        Ok(jumps)
    }

    async fn get_questions_attempts(
        &self,
        lesson_id: LessonId,
        retake: u32,
    ) -> Result<Vec<QuestionAttempt>, RemoteError> {
        let response: WsQuestionAttemptsResponse = self
            .call(
                "mod_lesson_get_questions_attempts",
                &[
                    lesson_param(lesson_id),
                    ("attempt".into(), retake.to_string()),
                ],
            )
            .await?;

        Ok(response
            .attempts
            .into_iter()
            .map(|a| QuestionAttempt {
                page_id: PageId::new(a.pageid),
                timestamp: a.timeseen,
                answer_id: a.answerid.map(AnswerId::new),
                correct: a.correct.unwrap_or(0) != 0,
                user_response: a.useranswer.map(|raw| {
                    serde_json::from_str::<UserResponse>(&raw)
                        .unwrap_or(UserResponse::Text(raw))
                }),
            })
            .collect())
    }

    async fn get_content_pages_viewed(
        &self,
        lesson_id: LessonId,
        retake: u32,
    ) -> Result<Vec<PageId>, RemoteError> {
        let response: WsContentPagesResponse = self
            .call(
                "mod_lesson_get_content_pages_viewed",
                &[
                    lesson_param(lesson_id),
                    ("lessonattempt".into(), retake.to_string()),
                ],
            )
            .await?;

        Ok(response
            .pages
            .into_iter()
            .map(|p| PageId::new(p.pageid))
            .collect())
    }

    async fn process_page(
        &self,
        lesson_id: LessonId,
        page_id: PageId,
        data: &AttemptData,
        password: Option<&str>,
    ) -> Result<ProcessPageOutcome, RemoteError> {
        let mut params = vec![
            lesson_param(lesson_id),
            ("pageid".into(), page_id.to_string()),
        ];
        params.extend(data_params(data));
        password_param(&mut params, password);

        let response: WsProcessPageResponse =
            self.call("mod_lesson_process_page", &params).await?;
        Ok(ProcessPageOutcome {
            new_page_id: response
                .newpageid
                .filter(|id| *id > 0)
                .map(|id| PageId::new(id as u64)),
            correct: response.correctanswer,
            warnings: response.warnings.into_iter().map(|w| w.message).collect(),
        })
    }

    async fn finish_retake(
        &self,
        lesson_id: LessonId,
        password: Option<&str>,
        out_of_time: bool,
        review: bool,
    ) -> Result<FinishRetakeOutcome, RemoteError> {
        let mut params = vec![
            lesson_param(lesson_id),
            ("outoftime".into(), i32::from(out_of_time).to_string()),
            ("review".into(), i32::from(review).to_string()),
        ];
        password_param(&mut params, password);

        let response: WsFinishResponse = self.call("mod_lesson_finish_attempt", &params).await?;
        Ok(FinishRetakeOutcome {
            review_page_id: review_page_id(&response.data),
            progress: eol_number(&response.data, "progresscompleted"),
        })
    }

    async fn launch_retake(
        &self,
        lesson_id: LessonId,
        password: Option<&str>,
        page_id: Option<PageId>,
        review: bool,
    ) -> Result<(), RemoteError> {
        let mut params = vec![
            lesson_param(lesson_id),
            ("review".into(), i32::from(review).to_string()),
        ];
        if let Some(page_id) = page_id {
            params.push(("pageid".into(), page_id.to_string()));
        }
        password_param(&mut params, password);

        let _: serde_json::Value = self.call("mod_lesson_launch_attempt", &params).await?;
        Ok(())
    }

    async fn get_retakes_overview(
        &self,
        lesson_id: LessonId,
    ) -> Result<RetakesOverview, RemoteError> {
        let response: WsOverviewResponse = self
            .call("mod_lesson_get_attempts_overview", &[lesson_param(lesson_id)])
            .await?;

        Ok(response.data.map_or_else(RetakesOverview::default, |d| {
            RetakesOverview {
                num_attempts: d.numofattempts.unwrap_or(0),
                avg_score: d.avgscore,
                high_score: d.highscore,
                low_score: d.lowscore,
            }
        }))
    }

    async fn get_user_retake(
        &self,
        lesson_id: LessonId,
        retake: u32,
    ) -> Result<UserRetake, RemoteError> {
        let response: WsUserRetakeResponse = self
            .call(
                "mod_lesson_get_user_attempt",
                &[
                    lesson_param(lesson_id),
                    ("userid".into(), "0".into()),
                    ("lessonattempt".into(), retake.to_string()),
                ],
            )
            .await?;

        Ok(UserRetake {
            retake,
            completed: response.userstats.completed != 0,
            grade: response.userstats.grade,
        })
    }

    async fn get_user_timers(&self, lesson_id: LessonId) -> Result<Vec<UserTimer>, RemoteError> {
        let response: WsTimersResponse = self
            .call("mod_lesson_get_user_timers", &[lesson_param(lesson_id)])
            .await?;

        Ok(response
            .timers
            .into_iter()
            .map(|t| UserTimer {
                start_time: t.starttime,
                lesson_time: t.lessontime,
                completed: t.completed.unwrap_or(0) != 0,
            })
            .collect())
    }
}
