//! GraphQL aggregation path.
//!
//! One composed query fetches everything the detail view needs in a single
//! provider round trip: metadata, up to five open issues, the pull request
//! count, up to ten mentionable users with commit contribution counts,
//! topics, license, disk usage, default branch, and the README blob.

use serde::Deserialize;

use crate::error::{GitHubError, Result};
use crate::format::format_count;
use crate::github::types::{Contributor, IssueSummary, ProcessedRepository};

/// Maximum open issues carried into the processed record.
pub const MAX_ISSUES: usize = 5;

/// Maximum mentionable users requested as contributor candidates.
pub const MAX_CONTRIBUTORS: usize = 10;

const DETAIL_QUERY: &str = r#"
query RepositoryDetail($owner: String!, $name: String!) {
  repository(owner: $owner, name: $name) {
    databaseId
    name
    nameWithOwner
    description
    stargazerCount
    forkCount
    issues(states: OPEN, first: 5, orderBy: {field: UPDATED_AT, direction: DESC}) {
      totalCount
      nodes { title number url }
    }
    pullRequests(states: OPEN) { totalCount }
    primaryLanguage { name }
    owner { login avatarUrl }
    mentionableUsers(first: 10) {
      nodes {
        login
        avatarUrl
        contributionsCollection { totalCommitContributions }
      }
    }
    repositoryTopics(first: 10) { nodes { topic { name } } }
    homepageUrl
    createdAt
    updatedAt
    licenseInfo { name }
    diskUsage
    defaultBranchRef { name }
    readme: object(expression: "HEAD:README.md") {
      ... on Blob { text }
    }
  }
}
"#;

/// Build the POST body for the combined detail query.
#[must_use]
pub fn detail_payload(owner: &str, name: &str) -> serde_json::Value {
    serde_json::json!({
        "query": DETAIL_QUERY,
        "variables": { "owner": owner, "name": name },
    })
}

#[derive(Debug, Deserialize)]
struct GraphQlEnvelope {
    #[serde(default)]
    data: Option<DetailData>,
    #[serde(default)]
    errors: Option<Vec<GraphQlErrorItem>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlErrorItem {
    message: String,
}

#[derive(Debug, Deserialize)]
struct DetailData {
    repository: Option<RepositoryNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepositoryNode {
    database_id: Option<u64>,
    name: String,
    name_with_owner: String,
    description: Option<String>,
    stargazer_count: u64,
    fork_count: u64,
    issues: IssueConnection,
    pull_requests: CountConnection,
    primary_language: Option<NamedNode>,
    owner: OwnerNode,
    mentionable_users: MentionableUsers,
    repository_topics: TopicConnection,
    homepage_url: Option<String>,
    license_info: Option<NamedNode>,
    disk_usage: Option<u64>,
    default_branch_ref: Option<NamedNode>,
    readme: Option<BlobNode>,
}

#[derive(Debug, Deserialize)]
struct IssueConnection {
    #[serde(rename = "totalCount")]
    total_count: u64,
    nodes: Vec<IssueNode>,
}

#[derive(Debug, Deserialize)]
struct IssueNode {
    title: String,
    number: u64,
    url: String,
}

#[derive(Debug, Deserialize)]
struct CountConnection {
    #[serde(rename = "totalCount")]
    total_count: u64,
}

#[derive(Debug, Deserialize)]
struct NamedNode {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OwnerNode {
    login: String,
    #[serde(default)]
    avatar_url: String,
}

#[derive(Debug, Deserialize)]
struct MentionableUsers {
    nodes: Vec<UserNode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserNode {
    login: String,
    #[serde(default)]
    avatar_url: String,
    contributions_collection: ContributionsCollection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContributionsCollection {
    total_commit_contributions: u64,
}

#[derive(Debug, Deserialize)]
struct TopicConnection {
    nodes: Vec<TopicNode>,
}

#[derive(Debug, Deserialize)]
struct TopicNode {
    topic: NamedNode,
}

#[derive(Debug, Deserialize)]
struct BlobNode {
    #[serde(default)]
    text: Option<String>,
}

/// Map a GraphQL response body to a [`ProcessedRepository`].
///
/// `fallback_id` covers repositories whose `databaseId` is absent from the
/// response; it is the id from the raw listing summary.
pub fn map_detail_response(body: &[u8], fallback_id: u64) -> Result<ProcessedRepository> {
    let envelope: GraphQlEnvelope = serde_json::from_slice(body)
        .map_err(|e| GitHubError::internal(format!("GraphQL response parse error: {e}")))?;

    if let Some(errors) = envelope.errors {
        if !errors.is_empty() {
            let messages: Vec<&str> = errors.iter().map(|e| e.message.as_str()).collect();
            return Err(GitHubError::internal(format!(
                "GraphQL errors: {}",
                messages.join("; ")
            )));
        }
    }

    let node = envelope
        .data
        .and_then(|d| d.repository)
        .ok_or_else(|| GitHubError::internal("GraphQL response missing repository node"))?;

    let mut contributors: Vec<Contributor> = node
        .mentionable_users
        .nodes
        .into_iter()
        .map(|u| Contributor {
            login: u.login,
            avatar_url: u.avatar_url,
            contributions: u.contributions_collection.total_commit_contributions,
        })
        .filter(|c| c.contributions > 0)
        .collect();
    contributors.sort_by(|a, b| b.contributions.cmp(&a.contributions));
    contributors.truncate(MAX_CONTRIBUTORS);

    let issues: Vec<IssueSummary> = node
        .issues
        .nodes
        .into_iter()
        .take(MAX_ISSUES)
        .map(|i| IssueSummary {
            title: i.title,
            number: i.number,
            html_url: i.url,
        })
        .collect();

    Ok(ProcessedRepository {
        id: node.database_id.unwrap_or(fallback_id),
        name: node.name,
        full_name: node.name_with_owner,
        description: node.description,
        stars: format_count(node.stargazer_count),
        forks: format_count(node.fork_count),
        open_issues: format_count(node.issues.total_count),
        pull_requests: format_count(node.pull_requests.total_count),
        language: node.primary_language.map(|l| l.name),
        owner: node.owner.login,
        avatar_url: node.owner.avatar_url,
        topics: node
            .repository_topics
            .nodes
            .into_iter()
            .map(|t| t.topic.name)
            .collect(),
        homepage: node.homepage_url,
        license: node.license_info.map(|l| l.name),
        size_kb: node.disk_usage.unwrap_or(0),
        default_branch: node
            .default_branch_ref
            .map(|b| b.name)
            .unwrap_or_else(|| "main".to_string()),
        readme: node.readme.and_then(|b| b.text).unwrap_or_default(),
        contributors,
        issues,
    })
}
