//! Detail-view state for one scholarship and the async driver that fills it in.
//!
//! Every stage is started with a [`CycleToken`] taken from a per-chain generation
//! counter. A completion whose token is no longer current is dropped without
//! touching state, so a slow response for an old input can never overwrite the
//! result for a newer one.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::watch;

use crate::client::ScholarshipApi;
use crate::error::{ApiError, ApiResult};
use crate::essay::{EssayDraft, EssayKind, SubmissionReceipt};
use crate::models::{
    MatchRequest, Scholarship, ScholarshipAnalysis, SpecificEssayRequest, StudentProfile,
    StudentScholarshipMatch,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Stage<T> {
    Idle,
    Pending,
    Ready(T),
    Failed(ApiError),
}

impl<T> Stage<T> {
    pub fn ready(&self) -> Option<&T> {
        match self {
            Stage::Ready(value) => Some(value),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&ApiError> {
        match self {
            Stage::Failed(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Stage::Idle)
    }

    fn from_result(result: ApiResult<T>) -> Self {
        match result {
            Ok(value) => Stage::Ready(value),
            Err(err) => Stage::Failed(err),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Chain {
    Analysis,
    Match,
    GeneralEssay,
    SpecificEssay,
}

impl Chain {
    fn essay(kind: EssayKind) -> Self {
        match kind {
            EssayKind::General => Chain::GeneralEssay,
            EssayKind::Specific => Chain::SpecificEssay,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleToken {
    chain: Chain,
    generation: u64,
}

#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Applied,
    Stale,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Analyzing,
    Analyzed,
    AnalysisFailed,
    Matching,
    Matched,
    MatchFailed,
    GeneratingEssay,
    EssayReady,
    EssayFailed,
    Submitted,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DetailError {
    #[error("scholarship analysis is not available")]
    AnalysisNotReady,

    #[error("no student profile selected")]
    NoStudent,

    #[error("match result is not available")]
    MatchNotReady,

    #[error("{} essay is not ready", .0.label())]
    EssayNotReady(EssayKind),

    #[error("application already submitted")]
    AlreadySubmitted,
}

#[derive(Debug, Clone)]
pub struct MatchInputs {
    pub student: StudentProfile,
    pub scholarship: Scholarship,
    pub analysis: ScholarshipAnalysis,
}

impl MatchInputs {
    pub fn request(&self) -> MatchRequest<'_> {
        MatchRequest {
            student: &self.student,
            scholarship: &self.scholarship,
            analysis: &self.analysis,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SpecificInputs {
    pub student: StudentProfile,
    pub scholarship: Scholarship,
    pub analysis: ScholarshipAnalysis,
    pub matched: StudentScholarshipMatch,
}

impl SpecificInputs {
    pub fn request(&self) -> SpecificEssayRequest<'_> {
        SpecificEssayRequest {
            student: &self.student,
            scholarship: &self.scholarship,
            analysis: &self.analysis,
            matched: &self.matched,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Generations {
    analysis: u64,
    matching: u64,
    general: u64,
    specific: u64,
}

impl Generations {
    fn slot(&mut self, chain: Chain) -> &mut u64 {
        match chain {
            Chain::Analysis => &mut self.analysis,
            Chain::Match => &mut self.matching,
            Chain::GeneralEssay => &mut self.general,
            Chain::SpecificEssay => &mut self.specific,
        }
    }

    fn current(&self, chain: Chain) -> u64 {
        match chain {
            Chain::Analysis => self.analysis,
            Chain::Match => self.matching,
            Chain::GeneralEssay => self.general,
            Chain::SpecificEssay => self.specific,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DetailView {
    scholarship: Scholarship,
    student: Option<StudentProfile>,
    analysis: Stage<ScholarshipAnalysis>,
    matching: Stage<StudentScholarshipMatch>,
    general_essay: Stage<EssayDraft>,
    specific_essay: Stage<EssayDraft>,
    generations: Generations,
    receipt: Option<SubmissionReceipt>,
}

impl DetailView {
    pub fn new(scholarship: Scholarship) -> Self {
        Self {
            scholarship,
            student: None,
            analysis: Stage::Idle,
            matching: Stage::Idle,
            general_essay: Stage::Idle,
            specific_essay: Stage::Idle,
            generations: Generations::default(),
            receipt: None,
        }
    }

    pub fn scholarship(&self) -> &Scholarship {
        &self.scholarship
    }

    pub fn student(&self) -> Option<&StudentProfile> {
        self.student.as_ref()
    }

    pub fn analysis(&self) -> &Stage<ScholarshipAnalysis> {
        &self.analysis
    }

    pub fn matching(&self) -> &Stage<StudentScholarshipMatch> {
        &self.matching
    }

    pub fn essay(&self, kind: EssayKind) -> &Stage<EssayDraft> {
        match kind {
            EssayKind::General => &self.general_essay,
            EssayKind::Specific => &self.specific_essay,
        }
    }

    pub fn receipt(&self) -> Option<&SubmissionReceipt> {
        self.receipt.as_ref()
    }

    /// Position in the analysis → match → specific essay chain.
    pub fn phase(&self) -> Phase {
        if self.receipt.is_some() {
            return Phase::Submitted;
        }

        match &self.analysis {
            Stage::Idle => Phase::Idle,
            Stage::Pending => Phase::Analyzing,
            Stage::Failed(_) => Phase::AnalysisFailed,
            Stage::Ready(_) => match &self.matching {
                Stage::Idle => Phase::Analyzed,
                Stage::Pending => Phase::Matching,
                Stage::Failed(_) => Phase::MatchFailed,
                Stage::Ready(_) => match &self.specific_essay {
                    Stage::Idle => Phase::Matched,
                    Stage::Pending => Phase::GeneratingEssay,
                    Stage::Ready(_) => Phase::EssayReady,
                    Stage::Failed(_) => Phase::EssayFailed,
                },
            },
        }
    }

    fn ensure_open(&self) -> Result<(), DetailError> {
        if self.receipt.is_some() {
            return Err(DetailError::AlreadySubmitted);
        }
        Ok(())
    }

    fn next_token(&mut self, chain: Chain) -> CycleToken {
        let slot = self.generations.slot(chain);
        *slot += 1;
        CycleToken {
            chain,
            generation: *slot,
        }
    }

    fn accepts(&self, token: CycleToken, chain: Chain) -> bool {
        self.receipt.is_none()
            && token.chain == chain
            && self.generations.current(chain) == token.generation
    }

    fn reset_match(&mut self) {
        self.next_token(Chain::Match);
        self.matching = Stage::Idle;
        self.reset_essay(EssayKind::Specific);
    }

    fn reset_essay(&mut self, kind: EssayKind) {
        self.next_token(Chain::essay(kind));
        *self.essay_mut(kind) = Stage::Idle;
    }

    fn essay_mut(&mut self, kind: EssayKind) -> &mut Stage<EssayDraft> {
        match kind {
            EssayKind::General => &mut self.general_essay,
            EssayKind::Specific => &mut self.specific_essay,
        }
    }

    /// Change the selected student. Returns false when the selection is unchanged.
    pub fn select_student(&mut self, student: Option<StudentProfile>) -> bool {
        if self.receipt.is_some() {
            return false;
        }

        let current = self.student.as_ref().map(|p| p.id.as_str());
        let next = student.as_ref().map(|p| p.id.as_str());
        if current == next {
            return false;
        }

        self.student = student;
        self.reset_match();
        self.reset_essay(EssayKind::General);
        true
    }

    pub fn begin_analysis(&mut self) -> Result<CycleToken, DetailError> {
        self.ensure_open()?;
        self.reset_match();
        let token = self.next_token(Chain::Analysis);
        self.analysis = Stage::Pending;
        Ok(token)
    }

    pub fn complete_analysis(
        &mut self,
        token: CycleToken,
        result: ApiResult<ScholarshipAnalysis>,
    ) -> Completion {
        if !self.accepts(token, Chain::Analysis) {
            return Completion::Stale;
        }

        let result = result.and_then(|analysis| {
            if analysis.scholarship_id == self.scholarship.id {
                Ok(analysis)
            } else {
                Err(ApiError::Decode(format!(
                    "analysis is for {} but view shows {}",
                    analysis.scholarship_id, self.scholarship.id
                )))
            }
        });
        self.analysis = Stage::from_result(result);
        Completion::Applied
    }

    pub fn begin_match(&mut self) -> Result<(CycleToken, MatchInputs), DetailError> {
        self.ensure_open()?;
        let student = self.student.clone().ok_or(DetailError::NoStudent)?;
        let analysis = self
            .analysis
            .ready()
            .cloned()
            .ok_or(DetailError::AnalysisNotReady)?;

        self.reset_essay(EssayKind::Specific);
        let token = self.next_token(Chain::Match);
        self.matching = Stage::Pending;

        Ok((
            token,
            MatchInputs {
                student,
                scholarship: self.scholarship.clone(),
                analysis,
            },
        ))
    }

    pub fn complete_match(
        &mut self,
        token: CycleToken,
        result: ApiResult<StudentScholarshipMatch>,
    ) -> Completion {
        if !self.accepts(token, Chain::Match) {
            return Completion::Stale;
        }

        let student_id = self.student.as_ref().map(|p| p.id.clone()).unwrap_or_default();
        let result = result.and_then(|matched| {
            if matched.student_id == student_id && matched.scholarship_id == self.scholarship.id {
                Ok(matched)
            } else {
                Err(ApiError::Decode(format!(
                    "match is for {}/{} but view shows {}/{}",
                    matched.student_id, matched.scholarship_id, student_id, self.scholarship.id
                )))
            }
        });
        self.matching = Stage::from_result(result);
        Completion::Applied
    }

    pub fn begin_general_essay(&mut self) -> Result<(CycleToken, StudentProfile), DetailError> {
        self.ensure_open()?;
        let student = self.student.clone().ok_or(DetailError::NoStudent)?;
        let token = self.next_token(Chain::GeneralEssay);
        self.general_essay = Stage::Pending;
        Ok((token, student))
    }

    pub fn begin_specific_essay(&mut self) -> Result<(CycleToken, SpecificInputs), DetailError> {
        self.ensure_open()?;
        let student = self.student.clone().ok_or(DetailError::NoStudent)?;
        let analysis = self
            .analysis
            .ready()
            .cloned()
            .ok_or(DetailError::AnalysisNotReady)?;
        let matched = self
            .matching
            .ready()
            .cloned()
            .ok_or(DetailError::MatchNotReady)?;

        let token = self.next_token(Chain::SpecificEssay);
        self.specific_essay = Stage::Pending;

        Ok((
            token,
            SpecificInputs {
                student,
                scholarship: self.scholarship.clone(),
                analysis,
                matched,
            },
        ))
    }

    pub fn complete_essay(
        &mut self,
        kind: EssayKind,
        token: CycleToken,
        result: ApiResult<String>,
    ) -> Completion {
        if !self.accepts(token, Chain::essay(kind)) {
            return Completion::Stale;
        }

        *self.essay_mut(kind) =
            Stage::from_result(result.map(|content| EssayDraft::generated(kind, content)));
        Completion::Applied
    }

    pub fn edit_essay(&mut self, kind: EssayKind, content: String) -> Result<(), DetailError> {
        self.ensure_open()?;
        match self.essay_mut(kind) {
            Stage::Ready(draft) => {
                draft.revise(content);
                Ok(())
            }
            _ => Err(DetailError::EssayNotReady(kind)),
        }
    }

    /// Submit one ready essay. Terminal: later completions and edits are rejected.
    pub fn submit(&mut self, kind: EssayKind) -> Result<SubmissionReceipt, DetailError> {
        self.ensure_open()?;
        let student_id = self
            .student
            .as_ref()
            .map(|p| p.id.clone())
            .ok_or(DetailError::NoStudent)?;
        let draft = self
            .essay(kind)
            .ready()
            .ok_or(DetailError::EssayNotReady(kind))?;

        let receipt = SubmissionReceipt::new(&student_id, &self.scholarship.id, draft);
        self.receipt = Some(receipt.clone());
        Ok(receipt)
    }
}

/// Drives a [`DetailView`] against the backend.
///
/// The view lock is only held for the synchronous begin/complete steps, never
/// across a request.
pub struct Orchestrator<A> {
    api: Arc<A>,
    view: Arc<Mutex<DetailView>>,
    submit_delay: Duration,
}

impl<A> Clone for Orchestrator<A> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            view: Arc::clone(&self.view),
            submit_delay: self.submit_delay,
        }
    }
}

fn log_completion(stage: &'static str, completion: Completion) {
    if completion == Completion::Stale {
        tracing::debug!(stage, "discarded response for a superseded request");
    }
}

impl<A: ScholarshipApi + 'static> Orchestrator<A> {
    pub fn new(api: Arc<A>, scholarship: Scholarship, submit_delay: Duration) -> Self {
        Self {
            api,
            view: Arc::new(Mutex::new(DetailView::new(scholarship))),
            submit_delay,
        }
    }

    fn view(&self) -> MutexGuard<'_, DetailView> {
        self.view.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn snapshot(&self) -> DetailView {
        self.view().clone()
    }

    pub async fn analyze(&self) -> Result<Completion, DetailError> {
        let token = self.view().begin_analysis()?;
        let scholarship = self.view().scholarship().clone();

        tracing::info!(scholarship = %scholarship.id, "analyzing scholarship");
        let result = self.api.analyze_scholarship(&scholarship).await;
        if let Err(err) = &result {
            tracing::warn!(scholarship = %scholarship.id, error = %err, "analysis failed");
        }

        let completion = self.view().complete_analysis(token, result);
        log_completion("analysis", completion);
        Ok(completion)
    }

    pub async fn run_match(&self) -> Result<Completion, DetailError> {
        let (token, inputs) = self.view().begin_match()?;

        tracing::info!(
            student = %inputs.student.id,
            scholarship = %inputs.scholarship.id,
            "matching student"
        );
        let result = self.api.match_student(&inputs.request()).await;
        if let Err(err) = &result {
            tracing::warn!(student = %inputs.student.id, error = %err, "match failed");
        }

        let completion = self.view().complete_match(token, result);
        log_completion("match", completion);
        Ok(completion)
    }

    pub async fn run_general_essay(&self) -> Result<Completion, DetailError> {
        let (token, student) = self.view().begin_general_essay()?;

        tracing::info!(student = %student.id, "generating general essay");
        let result = self.api.general_essay(&student).await;
        if let Err(err) = &result {
            tracing::warn!(student = %student.id, error = %err, "general essay failed");
        }

        let completion = self
            .view()
            .complete_essay(EssayKind::General, token, result);
        log_completion("general essay", completion);
        Ok(completion)
    }

    pub async fn run_specific_essay(&self) -> Result<Completion, DetailError> {
        let (token, inputs) = self.view().begin_specific_essay()?;

        tracing::info!(
            student = %inputs.student.id,
            scholarship = %inputs.scholarship.id,
            "generating specific essay"
        );
        let result = self.api.specific_essay(&inputs.request()).await;
        if let Err(err) = &result {
            tracing::warn!(student = %inputs.student.id, error = %err, "specific essay failed");
        }

        let completion = self
            .view()
            .complete_essay(EssayKind::Specific, token, result);
        log_completion("specific essay", completion);
        Ok(completion)
    }

    /// Match, then the specific essay once the match has landed.
    async fn match_then_specific(&self) {
        match self.run_match().await {
            Ok(Completion::Applied) => {}
            Ok(Completion::Stale) => return,
            Err(err) => {
                tracing::debug!(reason = %err, "match not started");
                return;
            }
        }

        let matched = self.view().matching().ready().is_some();
        if matched {
            if let Err(err) = self.run_specific_essay().await {
                tracing::debug!(reason = %err, "specific essay not started");
            }
        }
    }

    async fn general_if_selected(&self) {
        if let Err(err) = self.run_general_essay().await {
            tracing::debug!(reason = %err, "general essay not started");
        }
    }

    /// Analyze the scholarship and, if a student is already selected, continue the chain.
    pub async fn open(&self) {
        let analyzed = matches!(self.analyze().await, Ok(Completion::Applied));
        let ready = analyzed && self.view().analysis().ready().is_some();
        let has_student = self.view().student().is_some();

        if ready && has_student {
            self.match_then_specific().await;
        }
    }

    /// Apply a profile selection and regenerate everything keyed to the student.
    ///
    /// The general essay and the match chain run concurrently.
    pub async fn select_student(&self, student: Option<StudentProfile>) {
        let changed = self.view().select_student(student);
        if !changed {
            return;
        }

        self.restart_student_chain().await;
    }

    async fn restart_student_chain(&self) {
        tokio::join!(self.general_if_selected(), self.match_then_specific());
    }

    /// Follow a profile store until it is dropped, restarting the student chain on every change.
    ///
    /// The selection lands in the view before the loop waits again, so the view always holds
    /// the newest profile regardless of the order the spawned chains run in.
    pub async fn follow_profiles(self, mut profiles: watch::Receiver<Option<StudentProfile>>) {
        loop {
            let student = profiles.borrow_and_update().clone();
            if self.view().select_student(student) {
                let orchestrator = self.clone();
                tokio::spawn(async move { orchestrator.restart_student_chain().await });
            }

            if profiles.changed().await.is_err() {
                break;
            }
        }
    }

    pub fn edit_essay(&self, kind: EssayKind, content: String) -> Result<(), DetailError> {
        self.view().edit_essay(kind, content)
    }

    /// Submit the chosen essay, then hold for the fixed delay before the caller
    /// returns to the catalog.
    pub async fn submit(&self, kind: EssayKind) -> Result<SubmissionReceipt, DetailError> {
        let receipt = self.view().submit(kind)?;
        tracing::info!(
            receipt = %receipt.id,
            student = %receipt.student_id,
            scholarship = %receipt.scholarship_id,
            kind = kind.label(),
            "application submitted"
        );

        tokio::time::sleep(self.submit_delay).await;
        Ok(receipt)
    }
}
