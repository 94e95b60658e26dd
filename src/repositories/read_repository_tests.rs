// src/repositories/read_repository_tests.rs
//
// End-to-end repository tests against an in-memory SQLite database.
//
// Every fixture repository defaults to `post_type = book` ordered by id
// ascending, so expected id lists read in insertion order.

use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, TimeZone, Utc};

use crate::config::RepositoryConfig;
use crate::db::create_memory_pool;
use crate::domain::{NewPost, NewTerm, PostId, Term};
use crate::error::AppError;
use crate::filter_args;
use crate::query::{
    ArgumentSet, ClauseValue, Compare, FilterArg, FilterContext, FilterRegistry, FixedClock,
    Order, OrderBy, Projection, QueryVars, Scalar,
};
use crate::repositories::query_executor::QueryExecutor;
use crate::repositories::read_repository::{Item, ReadRepository};
use crate::repositories::sqlite::{SqlitePostStore, SqliteQueryExecutor};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()
}

struct Fixture {
    store: SqlitePostStore,
    executor: Arc<dyn QueryExecutor>,
    registry: Arc<FilterRegistry>,
    offset: FixedOffset,
}

impl Fixture {
    fn new() -> Self {
        Self::with_offset_hours(0)
    }

    fn with_offset_hours(hours: i32) -> Self {
        let offset = FixedOffset::east_opt(hours * 3600).unwrap();
        let pool = create_memory_pool().unwrap();
        Self {
            store: SqlitePostStore::new(pool.clone(), offset),
            executor: Arc::new(SqliteQueryExecutor::new(pool)),
            registry: Arc::new(FilterRegistry::with_builtin_filters()),
            offset,
        }
    }

    fn defaults(&self) -> ArgumentSet {
        let ctx = FilterContext::new(now(), self.offset);
        let post_type = self
            .registry
            .resolve("post_type")
            .unwrap()
            .build(&ctx, &filter_args!["book"])
            .unwrap();
        ArgumentSet::new()
            .with_fragment(post_type)
            .with_vars(QueryVars {
                order_by: Some(OrderBy::Id),
                order: Some(Order::Asc),
                ..QueryVars::default()
            })
    }

    fn repository(&self) -> ReadRepository {
        let mut repository = ReadRepository::new(Arc::clone(&self.executor), Arc::clone(&self.registry))
            .with_clock(Arc::new(FixedClock(now())))
            .with_offset(self.offset);
        repository.set_default_args(self.defaults());
        repository
    }

    fn insert(&self, post: NewPost) -> PostId {
        self.store.insert_post(&post).unwrap()
    }

    fn books(&self, count: usize) -> Vec<PostId> {
        (0..count)
            .map(|i| self.insert(NewPost::new("book").with_title(format!("Book {}", i))))
            .collect()
    }

    fn term(&self, name: &str, slug: &str) -> Term {
        self.store
            .create_term(&NewTerm::new("genre", name).with_slug(slug))
            .unwrap()
    }
}

/// Ids of the books matching one named filter
fn ids_by(fx: &Fixture, name: &str, args: Vec<FilterArg>) -> Vec<PostId> {
    fx.repository()
        .fields(Projection::Ids)
        .by(name, args)
        .unwrap()
        .get_ids()
        .unwrap()
}

fn item_id(item: Option<Item>) -> Option<PostId> {
    item.map(|i| i.id())
}

mod listing_tests {
    use super::*;

    #[test]
    fn test_returns_all_posts_by_default() {
        let fx = Fixture::new();
        let ids = fx.books(5);
        fx.insert(NewPost::new("review"));

        let mut repository = fx.repository();
        assert_eq!(repository.found().unwrap(), 5);
        assert_eq!(repository.count().unwrap(), 5);
        assert_eq!(repository.all().unwrap().len(), 5);
        assert_eq!(item_id(repository.first().unwrap()), Some(ids[0]));
        assert_eq!(item_id(repository.last().unwrap()), Some(ids[4]));
        assert_eq!(item_id(repository.nth(2).unwrap()), Some(ids[1]));
        assert_eq!(item_id(repository.nth(3).unwrap()), Some(ids[2]));
        assert_eq!(repository.nth(23).unwrap(), None);
        assert_eq!(repository.nth(0).unwrap(), None);
    }

    #[test]
    fn test_offsetting_results() {
        let fx = Fixture::new();
        let ids = fx.books(5);

        let mut repository = fx.repository();
        repository.offset(2);
        assert_eq!(repository.found().unwrap(), 5);
        assert_eq!(repository.count().unwrap(), 3);
        assert_eq!(repository.all().unwrap().len(), 3);
        assert_eq!(item_id(repository.first().unwrap()), Some(ids[2]));
        assert_eq!(item_id(repository.last().unwrap()), Some(ids[4]));
        assert_eq!(item_id(repository.nth(2).unwrap()), Some(ids[3]));
        assert_eq!(item_id(repository.nth(3).unwrap()), Some(ids[4]));
        assert_eq!(repository.nth(4).unwrap(), None);
    }

    #[test]
    fn test_pagination_arithmetic() {
        let fx = Fixture::new();
        let ids = fx.books(5);

        let mut page_1 = fx.repository();
        page_1.per_page(3).page(1);
        assert_eq!(page_1.found().unwrap(), 5);
        assert_eq!(page_1.count().unwrap(), 3);
        assert_eq!(page_1.get_ids().unwrap(), ids[..3].to_vec());
        assert_eq!(page_1.nth(4).unwrap(), None);

        let mut page_2 = fx.repository();
        page_2.per_page(3).page(2);
        assert_eq!(page_2.found().unwrap(), 5);
        assert_eq!(page_2.count().unwrap(), 2);
        assert_eq!(item_id(page_2.first().unwrap()), Some(ids[3]));
        assert_eq!(item_id(page_2.last().unwrap()), Some(ids[4]));
        assert_eq!(page_2.nth(3).unwrap(), None);
    }

    #[test]
    fn test_fields_setting_returns_ids() {
        let fx = Fixture::new();
        let ids = fx.books(5);

        let mut page_1 = fx.repository();
        page_1.per_page(3).page(1).fields(Projection::Ids);
        assert_eq!(page_1.found().unwrap(), 5);
        assert_eq!(page_1.count().unwrap(), 3);
        assert_eq!(page_1.first().unwrap(), Some(Item::Id(ids[0])));
        assert_eq!(page_1.last().unwrap(), Some(Item::Id(ids[2])));
        assert_eq!(page_1.nth(2).unwrap(), Some(Item::Id(ids[1])));
        assert_eq!(page_1.nth(4).unwrap(), None);

        // Switching back to objects re-projects the same page
        page_1.fields(Projection::Objects);
        let posts: Vec<PostId> = page_1
            .all()
            .unwrap()
            .into_iter()
            .filter_map(Item::into_post)
            .map(|p| p.id)
            .collect();
        assert_eq!(posts, ids[..3].to_vec());
    }

    #[test]
    fn test_take_clamps() {
        let fx = Fixture::new();
        let ids = fx.books(3);

        let mut repository = fx.repository();
        let taken: Vec<PostId> = repository.take(2).unwrap().iter().map(Item::id).collect();
        assert_eq!(taken, ids[..2].to_vec());
        assert_eq!(repository.take(10).unwrap().len(), 3);
    }

    #[test]
    fn test_ordering() {
        let fx = Fixture::new();
        let b = fx.insert(NewPost::new("book").with_title("b").with_menu_order(2));
        let a = fx.insert(NewPost::new("book").with_title("a").with_menu_order(3));
        let c = fx.insert(NewPost::new("book").with_title("c").with_menu_order(1));

        let mut by_title = fx.repository();
        by_title.order_by(OrderBy::Title, Order::Asc);
        assert_eq!(by_title.get_ids().unwrap(), vec![a, b, c]);

        let mut by_menu_order = fx.repository();
        by_menu_order.order_by(OrderBy::MenuOrder, Order::Desc);
        assert_eq!(by_menu_order.get_ids().unwrap(), vec![a, b, c]);
    }

    #[test]
    fn test_default_page_size_from_config() {
        let fx = Fixture::new();
        fx.books(5);

        let config = RepositoryConfig {
            default_per_page: Some(2),
            ..RepositoryConfig::default()
        };
        let mut repository =
            ReadRepository::with_config(Arc::clone(&fx.executor), Arc::clone(&fx.registry), &config)
                .unwrap();
        assert_eq!(repository.count().unwrap(), 2);
        assert_eq!(repository.found().unwrap(), 5);

        repository.unpaginated();
        assert_eq!(repository.count().unwrap(), 5);
    }
}

mod field_tests {
    use super::*;

    #[test]
    fn test_posts_by_title() {
        let fx = Fixture::new();
        let posts: Vec<PostId> = ["one", "one two", "one two three"]
            .iter()
            .map(|title| fx.insert(NewPost::new("book").with_title(*title)))
            .collect();

        let mut exact = fx.repository();
        exact.fields(Projection::Ids).by("title", filter_args!["one two"]).unwrap();
        assert_eq!(exact.first().unwrap(), Some(Item::Id(posts[1])));

        assert_eq!(ids_by(&fx, "title_like", filter_args!["two"]), posts[1..].to_vec());
        assert_eq!(ids_by(&fx, "title_like", filter_args!["one"]), posts);
    }

    #[test]
    fn test_posts_by_content() {
        let fx = Fixture::new();
        let posts: Vec<PostId> = ["one", "one two", "one two three", "foo bar"]
            .iter()
            .map(|content| fx.insert(NewPost::new("book").with_content(*content)))
            .collect();

        assert_eq!(ids_by(&fx, "content", filter_args!["two"]), posts[1..3].to_vec());
        assert_eq!(ids_by(&fx, "content", filter_args!["bar"]), vec![posts[3]]);
    }

    #[test]
    fn test_search() {
        let fx = Fixture::new();
        let ids = vec![
            fx.insert(NewPost::new("book").with_title("One").with_content("lorem")),
            fx.insert(NewPost::new("book").with_title("two").with_content("lorem one")),
            fx.insert(NewPost::new("book").with_title("three").with_content("lorem two")),
        ];

        let mut repository = fx.repository();
        repository.fields(Projection::Ids).search("one").unwrap();
        assert_eq!(repository.get_ids().unwrap(), ids[..2].to_vec());
    }

    #[test]
    fn test_like_treats_wildcards_literally() {
        let fx = Fixture::new();
        let literal = fx.insert(NewPost::new("book").with_title("50% off"));
        fx.insert(NewPost::new("book").with_title("500 off"));

        assert_eq!(ids_by(&fx, "title_like", filter_args!["0%"]), vec![literal]);
    }

    #[test]
    fn test_post_type_overrides_default() {
        let fx = Fixture::new();
        fx.books(2);
        let review = fx.insert(NewPost::new("review"));

        assert_eq!(ids_by(&fx, "post_type", filter_args!["review"]), vec![review]);
    }

    #[test]
    fn test_numeric_fields() {
        let fx = Fixture::new();
        let low = fx.insert(NewPost::new("book").with_menu_order(1).with_author(7));
        let high = fx.insert(NewPost::new("book").with_menu_order(10).with_author(8));

        assert_eq!(ids_by(&fx, "menu_order_gt", filter_args![5]), vec![high]);
        assert_eq!(ids_by(&fx, "menu_order_less_than_or_equal", filter_args![1]), vec![low]);
        assert_eq!(ids_by(&fx, "author", filter_args![[7, 9]]), vec![low]);
        assert_eq!(ids_by(&fx, "author_not_in", filter_args![[7]]), vec![high]);
    }

    #[test]
    fn test_id_lists_intersect() {
        let fx = Fixture::new();
        let ids = fx.books(4);

        let mut repository = fx.repository();
        repository
            .in_ids(&ids[..3])
            .unwrap()
            .in_ids(&ids[1..])
            .unwrap()
            .not_in_ids(&[ids[2]])
            .unwrap();
        assert_eq!(repository.get_ids().unwrap(), vec![ids[1]]);
    }
}

mod meta_tests {
    use super::*;

    fn setup() -> (Fixture, PostId, PostId) {
        let fx = Fixture::new();
        let post_1 = fx.insert(
            NewPost::new("book")
                .with_meta("common", "common_1")
                .with_meta("number_meta", "1")
                .with_meta("string_meta", "foo")
                .with_meta("interval_meta", "foo")
                .with_meta("woot", "zap"),
        );
        let post_2 = fx.insert(
            NewPost::new("book")
                .with_meta("common", "common_2")
                .with_meta("number_meta", "23")
                .with_meta("string_meta", "bar")
                .with_meta("interval_meta", "bar"),
        );
        (fx, post_1, post_2)
    }

    #[test]
    fn test_equality() {
        let (fx, post_1, _) = setup();
        assert_eq!(ids_by(&fx, "meta", filter_args!["common", "common_1"]), vec![post_1]);
        assert_eq!(ids_by(&fx, "meta_equals", filter_args!["common", "common_1"]), vec![post_1]);
        assert_eq!(ids_by(&fx, "meta_not_equals", filter_args!["common", "common_2"]), vec![post_1]);
    }

    #[test]
    fn test_numeric_comparisons() {
        let (fx, post_1, post_2) = setup();
        assert_eq!(ids_by(&fx, "meta_gt", filter_args!["number_meta", 12]), vec![post_2]);
        assert_eq!(ids_by(&fx, "meta_greater_than", filter_args!["number_meta", 12]), vec![post_2]);
        assert_eq!(ids_by(&fx, "meta_gte", filter_args!["number_meta", "1"]), vec![post_1, post_2]);
        assert_eq!(
            ids_by(&fx, "meta_greater_than_or_equal", filter_args!["number_meta", "1"]),
            vec![post_1, post_2]
        );
        assert_eq!(ids_by(&fx, "meta_lt", filter_args!["number_meta", 12]), vec![post_1]);
        assert_eq!(ids_by(&fx, "meta_less_than", filter_args!["number_meta", "12"]), vec![post_1]);
        assert_eq!(ids_by(&fx, "meta_lte", filter_args!["number_meta", 1]), vec![post_1]);
        assert_eq!(ids_by(&fx, "meta_less_than_or_equal", filter_args!["number_meta", 1]), vec![post_1]);
    }

    #[test]
    fn test_like_and_sets() {
        let (fx, post_1, post_2) = setup();
        assert_eq!(ids_by(&fx, "meta_like", filter_args!["string_meta", "foo"]), vec![post_1]);
        assert_eq!(ids_by(&fx, "meta_not_like", filter_args!["string_meta", "foo"]), vec![post_2]);
        assert_eq!(
            ids_by(&fx, "meta_in", filter_args!["interval_meta", ["foo", "bar"]]),
            vec![post_1, post_2]
        );
        assert_eq!(
            ids_by(&fx, "meta_not_in", filter_args!["interval_meta", ["foo", "baz"]]),
            vec![post_2]
        );
    }

    #[test]
    fn test_between() {
        let (fx, post_1, post_2) = setup();
        assert_eq!(ids_by(&fx, "meta_between", filter_args!["number_meta", [18, 25]]), vec![post_2]);
        assert_eq!(ids_by(&fx, "meta_not_between", filter_args!["number_meta", [18, 25]]), vec![post_1]);
    }

    #[test]
    fn test_existence() {
        let (fx, post_1, post_2) = setup();
        assert_eq!(ids_by(&fx, "meta_exists", filter_args!["woot"]), vec![post_1]);
        assert_eq!(ids_by(&fx, "meta_not_exists", filter_args!["woot"]), vec![post_2]);
    }

    #[test]
    fn test_regexp() {
        let (fx, post_1, post_2) = setup();
        assert_eq!(ids_by(&fx, "meta_regexp", filter_args!["string_meta", "^b.*"]), vec![post_2]);
        assert_eq!(ids_by(&fx, "meta_equals_regexp", filter_args!["string_meta", "^b.*"]), vec![post_2]);
        assert_eq!(ids_by(&fx, "meta_not_regexp", filter_args!["string_meta", "^b.*"]), vec![post_1]);
        assert_eq!(
            ids_by(&fx, "meta_not_equals_regexp", filter_args!["string_meta", "^b.*"]),
            vec![post_1]
        );
    }

    #[test]
    fn test_negation_requires_the_key() {
        let (fx, _, post_2) = setup();
        // post_2 has no `woot` key, so it is not "woot != zip"
        assert_eq!(ids_by(&fx, "meta_not_equals", filter_args!["woot", "zip"]).len(), 1);
        assert!(!ids_by(&fx, "meta_not_equals", filter_args!["woot", "zip"]).contains(&post_2));
    }

    #[test]
    fn test_repeated_in_narrows() {
        let (fx, _, post_2) = setup();
        let mut repository = fx.repository();
        repository
            .by("meta_in", filter_args!["interval_meta", ["foo", "bar"]])
            .unwrap()
            .by("meta_in", filter_args!["interval_meta", ["bar", "baz"]])
            .unwrap();
        assert_eq!(repository.get_ids().unwrap(), vec![post_2]);
    }

    #[test]
    fn test_different_keys_both_apply() {
        let (fx, post_1, _) = setup();
        let mut repository = fx.repository();
        repository
            .by("meta_lt", filter_args!["number_meta", 100])
            .unwrap()
            .by("meta_like", filter_args!["string_meta", "fo"])
            .unwrap();
        assert_eq!(repository.get_ids().unwrap(), vec![post_1]);
    }

    #[test]
    fn test_typed_filter_matches_named_filter() {
        let (fx, _, post_2) = setup();
        let mut repository = fx.repository();
        repository
            .filter(crate::query::Filter::meta(
                "number_meta",
                Compare::Gte,
                ClauseValue::One(Scalar::Int(10)),
            ))
            .unwrap();
        assert_eq!(repository.get_ids().unwrap(), vec![post_2]);
        assert_eq!(repository.get_ids().unwrap(), ids_by(&fx, "meta_gte", filter_args!["number_meta", 10]));
    }
}

mod taxonomy_tests {
    use super::*;

    struct Genres {
        fx: Fixture,
        fiction: Term,
        history: Term,
        non_fiction: Term,
        posts: Vec<PostId>,
    }

    fn setup() -> Genres {
        let fx = Fixture::new();
        let fiction = fx.term("fiction", "fict");
        let history = fx.term("history", "hist");
        let non_fiction = fx.term("non-fiction", "non-fict");

        let post_1 = fx.insert(NewPost::new("book"));
        let post_2 = fx.insert(NewPost::new("book"));
        let post_3 = fx.insert(NewPost::new("book"));
        let post_4 = fx.insert(NewPost::new("book"));
        fx.store.assign_terms(post_1, &[fiction.id]).unwrap();
        fx.store.assign_terms(post_2, &[non_fiction.id, history.id]).unwrap();
        fx.store.assign_terms(post_3, &[non_fiction.id]).unwrap();

        Genres {
            fx,
            fiction,
            history,
            non_fiction,
            posts: vec![post_1, post_2, post_3, post_4],
        }
    }

    #[test]
    fn test_taxonomy_existence() {
        let g = setup();
        assert_eq!(ids_by(&g.fx, "taxonomy_exists", filter_args!["genre"]), g.posts[..3].to_vec());
        assert_eq!(ids_by(&g.fx, "taxonomy_not_exists", filter_args!["genre"]), vec![g.posts[3]]);
    }

    #[test]
    fn test_terms_by_id() {
        let g = setup();
        let ids = [g.fiction.id, g.history.id];
        assert_eq!(ids_by(&g.fx, "term_id_in", filter_args!["genre", ids]), g.posts[..2].to_vec());
        assert_eq!(ids_by(&g.fx, "term_id_not_in", filter_args!["genre", ids]), g.posts[2..].to_vec());
        assert_eq!(
            ids_by(&g.fx, "term_id_and", filter_args!["genre", [g.non_fiction.id, g.history.id]]),
            vec![g.posts[1]]
        );
    }

    #[test]
    fn test_terms_by_name() {
        let g = setup();
        let names = ["fiction", "history"];
        assert_eq!(ids_by(&g.fx, "term_name_in", filter_args!["genre", names]), g.posts[..2].to_vec());
        assert_eq!(ids_by(&g.fx, "term_name_not_in", filter_args!["genre", names]), g.posts[2..].to_vec());
        assert_eq!(
            ids_by(&g.fx, "term_name_and", filter_args!["genre", ["non-fiction", "history"]]),
            vec![g.posts[1]]
        );
    }

    #[test]
    fn test_terms_by_slug() {
        let g = setup();
        let slugs = ["fict", "hist"];
        assert_eq!(ids_by(&g.fx, "term_slug_in", filter_args!["genre", slugs]), g.posts[..2].to_vec());
        assert_eq!(ids_by(&g.fx, "term_slug_not_in", filter_args!["genre", slugs]), g.posts[2..].to_vec());
        assert_eq!(
            ids_by(&g.fx, "term_slug_and", filter_args!["genre", ["non-fict", "hist"]]),
            vec![g.posts[1]]
        );
    }

    #[test]
    fn test_and_is_subset_of_in() {
        let g = setup();
        for terms in [["non-fict", "hist"], ["fict", "hist"], ["fict", "non-fict"]] {
            let all_of = ids_by(&g.fx, "term_slug_and", filter_args!["genre", terms]);
            let any_of = ids_by(&g.fx, "term_slug_in", filter_args!["genre", terms]);
            assert!(all_of.len() <= any_of.len());
            assert!(all_of.iter().all(|id| any_of.contains(id)));
        }
    }

    #[test]
    fn test_other_taxonomy_does_not_leak() {
        let g = setup();
        let topic = g
            .fx
            .store
            .create_term(&NewTerm::new("topic", "history").with_slug("hist"))
            .unwrap();
        g.fx.store.assign_terms(g.posts[3], &[topic.id]).unwrap();

        assert_eq!(
            ids_by(&g.fx, "term_slug_in", filter_args!["genre", ["hist"]]),
            vec![g.posts[1]]
        );
    }
}

mod date_tests {
    use super::*;

    struct Timeline {
        fx: Fixture,
        past: PostId,
        recent: PostId,
        future: PostId,
    }

    fn local(offset: FixedOffset, shift: Duration) -> NaiveDateTime {
        (now() + shift).with_timezone(&offset).naive_local()
    }

    /// Site in Tokyo (+09:00): posts a week ago, an hour ago and in a week
    fn setup() -> Timeline {
        let fx = Fixture::with_offset_hours(9);
        let past = fx.insert(NewPost::new("book").with_date(local(fx.offset, -Duration::weeks(1))));
        let recent = fx.insert(NewPost::new("book").with_date(local(fx.offset, -Duration::hours(1))));
        let future = fx.insert(
            NewPost::new("book")
                .with_date(local(fx.offset, Duration::weeks(1)))
                .with_status("future"),
        );
        Timeline {
            fx,
            past,
            recent,
            future,
        }
    }

    fn dated(t: &Timeline, name: &str, expression: &str) -> Vec<PostId> {
        t.fx.repository()
            .fields(Projection::Ids)
            .by("status", filter_args!["any"])
            .unwrap()
            .by(name, filter_args![expression])
            .unwrap()
            .get_ids()
            .unwrap()
    }

    #[test]
    fn test_local_absolute_bounds() {
        let t = setup();
        // Two hours ago, site time
        assert_eq!(dated(&t, "date", "2024-03-10 19:00:00"), vec![t.recent, t.future]);
        assert_eq!(dated(&t, "before_date", "2024-03-10 19:00:00"), vec![t.past]);
        assert_eq!(dated(&t, "after_date", "2024-03-10 19:00:00"), vec![t.recent, t.future]);
    }

    #[test]
    fn test_local_relative_bounds() {
        let t = setup();
        assert_eq!(dated(&t, "after_date", "-2 hours"), vec![t.recent, t.future]);
        assert_eq!(dated(&t, "before_date", "-1 hour"), vec![t.past, t.recent]);
    }

    #[test]
    fn test_boundary_inclusivity() {
        let t = setup();
        // `recent` sits exactly on "-1 hour"
        assert_eq!(dated(&t, "date", "-1 hour"), vec![t.recent, t.future]);
        assert_eq!(dated(&t, "after_date", "-1 hour"), vec![t.future]);
        assert_eq!(dated(&t, "before_date", "-1 hour"), vec![t.past, t.recent]);

        assert_eq!(dated(&t, "date_gmt", "-1 hour"), vec![t.recent, t.future]);
        assert_eq!(dated(&t, "after_date_gmt", "-1 hour"), vec![t.future]);
        assert_eq!(dated(&t, "before_date_gmt", "-1 hour"), vec![t.past, t.recent]);
    }

    #[test]
    fn test_gmt_bounds() {
        let t = setup();
        // Two hours ago in UTC is 10:00; local dates would say 19:00
        assert_eq!(dated(&t, "after_date_gmt", "2024-03-10 10:00:00"), vec![t.recent, t.future]);
        assert_eq!(dated(&t, "before_date_gmt", "2024-03-10 10:00:00"), vec![t.past]);
        assert_eq!(dated(&t, "date", "2024-03-10 10:00:00"), vec![t.recent, t.future]);
        assert_eq!(dated(&t, "date", "2024-03-10 20:30:00"), vec![t.future]);
    }

    #[test]
    fn test_rfc3339_converts_to_column_zone() {
        let t = setup();
        // 11:00Z is 20:00 in Tokyo, exactly `recent`
        assert_eq!(dated(&t, "date", "2024-03-10T11:00:00Z"), vec![t.recent, t.future]);
        assert_eq!(dated(&t, "after_date", "2024-03-10T11:00:00Z"), vec![t.future]);
    }

    #[test]
    fn test_unparsable_date_is_rejected() {
        let t = setup();
        let mut repository = t.fx.repository();
        let before = repository.snapshot();
        let result = repository.by("after_date", filter_args!["sometime soon"]);
        assert!(matches!(result, Err(AppError::InvalidFilterArguments { .. })));
        assert_eq!(repository.snapshot(), before);
    }
}

mod status_tests {
    use super::*;

    #[test]
    fn test_fetching_posts_by_status() {
        let fx = Fixture::new();
        let draft = fx.insert(NewPost::new("book").with_status("draft"));
        let published = fx.insert(NewPost::new("book"));
        let future = fx.insert(NewPost::new("book").with_status("future"));

        let mut repository = fx.repository();
        repository.fields(Projection::Ids);
        assert_eq!(repository.get_ids().unwrap(), vec![published]);

        repository.by("status", filter_args!["publish"]).unwrap();
        assert_eq!(repository.get_ids().unwrap(), vec![published]);

        repository.by("status", filter_args![["publish", "future"]]).unwrap();
        assert_eq!(repository.get_ids().unwrap(), vec![published, future]);

        repository.by("status", filter_args!["any"]).unwrap();
        assert_eq!(repository.get_ids().unwrap(), vec![draft, published, future]);
    }

    #[test]
    fn test_visible_statuses_from_config() {
        let fx = Fixture::new();
        let draft = fx.insert(NewPost::new("book").with_status("draft"));
        fx.insert(NewPost::new("book"));

        let config = RepositoryConfig {
            visible_statuses: vec!["draft".to_string()],
            ..RepositoryConfig::default()
        };
        let mut repository =
            ReadRepository::with_config(Arc::clone(&fx.executor), Arc::clone(&fx.registry), &config)
                .unwrap();
        assert_eq!(repository.get_ids().unwrap(), vec![draft]);
    }
}

mod relationship_tests {
    use super::*;

    #[test]
    fn test_not_related_to_ignores_dangling_references() {
        let fx = Fixture::new();
        let books = fx.books(5);
        let reviews: Vec<PostId> = (0..5).map(|_| fx.insert(NewPost::new("review"))).collect();

        fx.store.add_meta(reviews[0], "book_id", &books[4].to_string()).unwrap();
        fx.store.add_meta(reviews[1], "book_id", &books[4].to_string()).unwrap();
        fx.store.add_meta(reviews[2], "book_id", &books[3].to_string()).unwrap();
        fx.store.add_meta(reviews[3], "book_id", &books[2].to_string()).unwrap();
        // A review of a book that does not exist
        fx.store.add_meta(reviews[4], "book_id", "987654").unwrap();

        let mut repository = fx.repository();
        let mut ids = repository
            .by_args([("post_type", filter_args!["book"])])
            .unwrap()
            .by_not_related_to(&["book_id"])
            .unwrap()
            .get_ids()
            .unwrap();
        ids.sort_unstable();

        assert_eq!(ids, vec![books[0], books[1]]);
    }

    #[test]
    fn test_self_reference_is_not_a_relation() {
        let fx = Fixture::new();
        let books = fx.books(2);
        fx.store.add_meta(books[0], "book_id", &books[0].to_string()).unwrap();

        let mut repository = fx.repository();
        repository.by_not_related_to(&["book_id"]).unwrap();
        assert_eq!(repository.get_ids().unwrap(), books);
    }

    #[test]
    fn test_repeated_calls_union_keys() {
        let fx = Fixture::new();

        let mut split = fx.repository();
        split
            .by_not_related_to(&["a"])
            .unwrap()
            .by_not_related_to(&["b"])
            .unwrap();

        let mut joined = fx.repository();
        joined.by_not_related_to(&["a", "b"]).unwrap();

        assert_eq!(split.snapshot(), joined.snapshot());
    }

    #[test]
    fn test_any_key_relates() {
        let fx = Fixture::new();
        let books = fx.books(3);
        let review = fx.insert(NewPost::new("review"));
        fx.store.add_meta(review, "book_id", &books[0].to_string()).unwrap();
        fx.store.add_meta(review, "sequel_id", &books[1].to_string()).unwrap();

        let mut repository = fx.repository();
        repository.by_not_related_to(&["book_id"]).unwrap();
        assert_eq!(repository.get_ids().unwrap(), books[1..].to_vec());

        repository.by_not_related_to(&["sequel_id"]).unwrap();
        assert_eq!(repository.get_ids().unwrap(), vec![books[2]]);
    }
}

mod builder_tests {
    use super::*;
    use crate::query::CombineStrategy;

    #[test]
    fn test_overwrite_is_order_independent() {
        let fx = Fixture::new();

        let mut twice = fx.repository();
        twice
            .by("status", filter_args!["publish"])
            .unwrap()
            .by("status", filter_args!["draft"])
            .unwrap();

        let mut once = fx.repository();
        once.by("status", filter_args!["draft"]).unwrap();

        assert_eq!(twice.snapshot(), once.snapshot());
    }

    #[test]
    fn test_unknown_filter_changes_nothing() {
        let fx = Fixture::new();
        let mut repository = fx.repository();
        let before = repository.snapshot();

        let result = repository.by("meta_sideways", filter_args!["k", 1]);
        assert!(matches!(result, Err(AppError::UnknownFilter(name)) if name == "meta_sideways"));
        assert_eq!(repository.snapshot(), before);
        assert!(repository.get_last_built_query().is_none());
    }

    #[test]
    fn test_invalid_arguments_are_rejected_atomically() {
        let fx = Fixture::new();
        let mut repository = fx.repository();
        let before = repository.snapshot();

        let result = repository.by("meta_between", filter_args!["number_meta", [18]]);
        assert!(matches!(result, Err(AppError::InvalidFilterArguments { .. })));
        assert_eq!(repository.snapshot(), before);

        let batch = repository.by_args([
            ("status", filter_args!["draft"]),
            ("meta_between", filter_args!["number_meta", [18]]),
        ]);
        assert!(batch.is_err());
        assert_eq!(repository.snapshot(), before);
    }

    #[test]
    fn test_custom_filter_stays_local() {
        let fx = Fixture::new();
        fx.insert(NewPost::new("book").with_meta("price", "25"));
        let cheap = fx.insert(NewPost::new("book").with_meta("price", "5"));

        let mut repository = fx.repository();
        repository.register_filter("cheap", CombineStrategy::Overwrite, |ctx, args| {
            crate::query::filters::expect_arity("cheap", args, 0)?;
            crate::query::Filter::meta("price", Compare::Lt, ClauseValue::One(Scalar::Int(10)))
                .into_fragment("cheap", ctx)
        });
        repository.by("cheap", filter_args![]).unwrap();
        assert_eq!(repository.get_ids().unwrap(), vec![cheap]);

        assert!(!fx.registry.contains("cheap"));
        assert!(matches!(
            fx.repository().by("cheap", filter_args![]),
            Err(AppError::UnknownFilter(_))
        ));
    }

    #[test]
    fn test_flush_resets_to_defaults() {
        let fx = Fixture::new();
        let ids = fx.books(3);

        let mut repository = fx.repository();
        repository.in_ids(&ids[..1]).unwrap();
        assert_eq!(repository.get_ids().unwrap(), vec![ids[0]]);

        repository.flush();
        assert_eq!(repository.snapshot(), fx.defaults());
        assert_eq!(repository.get_ids().unwrap(), ids);
    }

    #[test]
    fn test_default_args_round_trip() {
        let fx = Fixture::new();
        let repository = fx.repository();
        assert_eq!(repository.get_default_args(), &fx.defaults());
    }
}

mod query_cache_tests {
    use super::*;
    use crate::query::CacheState;

    #[test]
    fn test_same_query_across_accessors() {
        let fx = Fixture::new();
        fx.books(3);

        let mut repository = fx.repository();
        assert_eq!(repository.cache_state(), CacheState::Empty);
        repository.all().unwrap();
        let built = repository.get_last_built_query().unwrap().id();
        assert_eq!(repository.cache_state(), CacheState::Populated);

        repository.get_ids().unwrap();
        repository.found().unwrap();
        repository.count().unwrap();
        repository.first().unwrap();
        repository.last().unwrap();
        repository.nth(2).unwrap();
        repository.take(2).unwrap();
        assert_eq!(repository.get_last_built_query().unwrap().id(), built);
    }

    #[test]
    fn test_flush_builds_a_new_query() {
        let fx = Fixture::new();
        fx.books(3);

        let mut repository = fx.repository();
        repository.all().unwrap();
        let first = repository.get_last_built_query().unwrap().clone();

        repository.flush();
        assert_eq!(repository.cache_state(), CacheState::Empty);
        repository.all().unwrap();
        let second = repository.get_last_built_query().unwrap();

        assert_ne!(first.id(), second.id());
        assert_eq!(first.fingerprint(), second.fingerprint());
    }

    #[test]
    fn test_filter_call_invalidates() {
        let fx = Fixture::new();
        let ids = fx.books(3);

        let mut repository = fx.repository();
        repository.all().unwrap();
        let first = repository.get_last_built_query().unwrap().id();

        repository.in_ids(&ids[1..]).unwrap();
        assert_eq!(repository.cache_state(), CacheState::Empty);
        assert_eq!(repository.get_ids().unwrap(), ids[1..].to_vec());
        assert_ne!(repository.get_last_built_query().unwrap().id(), first);
    }

    #[test]
    fn test_build_query_without_executing() {
        let fx = Fixture::new();
        let mut repository = fx.repository();
        let query = repository.build_query().unwrap();
        assert_eq!(repository.cache_state(), CacheState::Compiled);
        assert!(query.statement().contains("p.status IN"));

        repository.get_ids().unwrap();
        assert_eq!(repository.get_last_built_query().unwrap().id(), query.id());
    }
}
