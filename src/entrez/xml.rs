//! PubMed efetch XML (`PubmedArticleSet`) parsing.

use roxmltree::{Document, Node, ParsingOptions};

use super::EntrezError;
use super::types::{NO_ABSTRACT, Pmid, Record};

const ROOT_TAG: &str = "PubmedArticleSet";

/// Parse every `PubmedArticle` in an efetch response.
///
/// A missing PMID or title fails the whole document, so the caller retries
/// or drops the chunk as a unit.
pub fn parse_articles(xml: &str) -> Result<Vec<Record>, EntrezError> {
    // efetch responses carry a DOCTYPE declaration.
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    let doc = Document::parse_with_options(xml, options)?;

    let root = doc.root_element();
    if !root.has_tag_name(ROOT_TAG) {
        return Err(EntrezError::UnexpectedRoot(
            root.tag_name().name().to_string(),
        ));
    }

    root.children()
        .filter(|n| n.has_tag_name("PubmedArticle"))
        .map(parse_article)
        .collect()
}

fn parse_article(article: Node<'_, '_>) -> Result<Record, EntrezError> {
    let pmid = find_path(article, &["MedlineCitation", "PMID"])
        .map(|n| collect_text(n).trim().to_string())
        .filter(|p| !p.is_empty())
        .ok_or(EntrezError::MissingField("PMID"))?;

    let title = find_path(article, &["MedlineCitation", "Article", "ArticleTitle"])
        .map(collect_text)
        .ok_or(EntrezError::MissingField("ArticleTitle"))?;

    let sections: Vec<String> =
        find_path(article, &["MedlineCitation", "Article", "Abstract"])
            .map(|abs| {
                abs.children()
                    .filter(|n| n.has_tag_name("AbstractText"))
                    .map(collect_text)
                    .filter(|t| !t.trim().is_empty())
                    .collect()
            })
            .unwrap_or_default();

    let abstract_text = if sections.is_empty() {
        NO_ABSTRACT.to_string()
    } else {
        sections.join(" ")
    };

    Ok(Record {
        pmid: Pmid(pmid),
        title,
        abstract_text,
    })
}

fn find_path<'a, 'input>(node: Node<'a, 'input>, path: &[&str]) -> Option<Node<'a, 'input>> {
    path.iter().try_fold(node, |current, tag| {
        current.children().find(|n| n.has_tag_name(*tag))
    })
}

/// Concatenated text of a node, including inline markup such as `<i>` or `<sup>`.
fn collect_text(node: Node<'_, '_>) -> String {
    node.descendants()
        .filter(|n| n.is_text())
        .filter_map(|n| n.text())
        .collect()
}
