//! GitHub commit-search client.
//!
//! Student commit messages are the review comments attached to attendance.
//! Commits are found with `GET /search/commits`, which pages 100 items at a
//! time and stops returning results after 1000.

use chrono::{DateTime, NaiveDate, Utc};

use tracker_config::CodeHostConfig;

use crate::error::SourceError;
use crate::http::{check_response, read_json};
use crate::{CodeComment, CommentScope, CommentSource, build_http};

const PER_PAGE: usize = 100;
const MAX_PAGES: usize = 10;

#[derive(serde::Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(serde::Deserialize)]
struct SearchItem {
    commit: CommitDetail,
    author: Option<Account>,
    repository: Repository,
}

#[derive(serde::Deserialize)]
struct CommitDetail {
    message: String,
    committer: Signature,
}

#[derive(serde::Deserialize)]
struct Signature {
    date: DateTime<Utc>,
}

#[derive(serde::Deserialize)]
struct Account {
    login: String,
}

#[derive(serde::Deserialize)]
struct Repository {
    name: String,
}

impl SearchItem {
    /// Commits without a linked account cannot be matched to a student.
    fn into_comment(self) -> Option<CodeComment> {
        let author = self.author?;
        Some(CodeComment {
            author_login: author.login,
            repo: self.repository.name,
            message: self.commit.message.trim().to_string(),
            committed_at: self.commit.committer.date,
        })
    }
}

pub struct GithubClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
    organization: String,
    level_organizations: Vec<String>,
}

impl GithubClient {
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the HTTP client cannot be built.
    pub fn new(config: &CodeHostConfig) -> Result<Self, SourceError> {
        Ok(Self {
            http: build_http()?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.key.clone(),
            organization: config.organization.clone(),
            level_organizations: config.level_organizations.clone(),
        })
    }

    fn organization_for(&self, scope: CommentScope) -> Option<&str> {
        let org = match scope {
            CommentScope::Organization => Some(&self.organization),
            CommentScope::Level(level) => self.level_organizations.get(usize::from(level)),
        };
        org.map(String::as_str).filter(|o| !o.is_empty())
    }

    async fn search(&self, query: &str) -> Result<Vec<CodeComment>, SourceError> {
        let mut comments = Vec::new();

        for page in 1..=MAX_PAGES {
            let url = search_url(&self.base_url, query, page);
            let resp = self
                .http
                .get(&url)
                .header("Accept", "application/vnd.github+json")
                .bearer_auth(&self.token)
                .send()
                .await?;
            let body: SearchResponse = read_json(check_response(resp).await?).await?;
            let count = body.items.len();
            comments.extend(body.items.into_iter().filter_map(SearchItem::into_comment));

            if count < PER_PAGE {
                break;
            }
        }

        tracing::debug!(query, comments = comments.len(), "github commit search complete");
        Ok(comments)
    }
}

impl CommentSource for GithubClient {
    async fn fetch_comments(
        &self,
        scope: CommentScope,
        since: NaiveDate,
    ) -> Result<Vec<CodeComment>, SourceError> {
        let Some(org) = self.organization_for(scope) else {
            tracing::debug!(%scope, "no organization configured, skipping");
            return Ok(Vec::new());
        };
        self.search(&format!("org:{org} committer-date:>={since}"))
            .await
    }

    async fn fetch_user_comments(
        &self,
        login: &str,
        since: NaiveDate,
    ) -> Result<Vec<CodeComment>, SourceError> {
        self.search(&format!("author:{login} committer-date:>={since}"))
            .await
    }
}

fn search_url(base_url: &str, query: &str, page: usize) -> String {
    format!(
        "{base_url}/search/commits?q={}&sort=committer-date&order=asc&per_page={PER_PAGE}&page={page}",
        urlencoding::encode(query)
    )
}
