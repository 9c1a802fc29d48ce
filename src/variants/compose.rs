/// Word distance used when the caller gives none.
pub const DEFAULT_PROXIMITY: i32 = 2;

/// OR-join of `"<v1> <v2>"[tiab:~<proximity>]` for every pair in `first × second`.
///
/// Input order is preserved, pairs are not de-duplicated, and the result is
/// not capped. Large variant lists can exceed PubMed's query length limit.
pub fn compose<A, B>(first: &[A], second: &[B], proximity: i32) -> String
where
    A: AsRef<str>,
    B: AsRef<str>,
{
    first
        .iter()
        .flat_map(|a| {
            second.iter().map(move |b| {
                format!("\"{} {}\"[tiab:~{proximity}]", a.as_ref(), b.as_ref())
            })
        })
        .collect::<Vec<_>>()
        .join(" OR ")
}
