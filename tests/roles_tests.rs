//! Role resolution against the profile table: allow-list, case folding and
//! the collapse of every failure into "not admin".

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use backoffice::db::MemoryDatabase;
use backoffice::identity::{get_user_role, is_admin};
use backoffice::profiles::ProfileStore;

use common::{profile, FlakyDatabase};

async fn store_with(rows: &[(&str, &str)]) -> ProfileStore {
    let store = ProfileStore::new(Arc::new(MemoryDatabase::new()));
    for (auth_id, role) in rows {
        store
            .insert(&profile(auth_id, &format!("{auth_id}@shop.test"), auth_id, role))
            .await
            .expect("insert");
    }
    store
}

#[tokio::test]
async fn admin_tier_roles_are_admin_case_insensitively() {
    let store = store_with(&[("u1", "admin"), ("u2", "SuperAdmin"), ("u3", "MANAGER"), ("u4", " manager ")]).await;
    for id in ["u1", "u2", "u3", "u4"] {
        assert!(is_admin(&store, Some(id)).await, "{id} should be admin tier");
    }
}

#[tokio::test]
async fn other_roles_are_not_admin_but_role_is_returned_raw() {
    let store = store_with(&[("u1", "cashier"), ("u2", "other"), ("u3", "admins")]).await;
    for id in ["u1", "u2", "u3"] {
        assert!(!is_admin(&store, Some(id)).await, "{id} must not be admin tier");
    }
    assert_eq!(get_user_role(&store, Some("u1")).await.as_deref(), Some("cashier"));
}

#[tokio::test]
async fn absent_or_unknown_user_is_not_admin() {
    let store = store_with(&[("u1", "admin")]).await;
    assert!(!is_admin(&store, None).await);
    assert!(!is_admin(&store, Some("")).await);
    assert!(!is_admin(&store, Some("ghost")).await);
    assert_eq!(get_user_role(&store, None).await, None);
    assert_eq!(get_user_role(&store, Some("ghost")).await, None);
}

#[tokio::test]
async fn query_errors_collapse_to_false() {
    let db = Arc::new(FlakyDatabase::new());
    let store = ProfileStore::new(db.clone());
    store.insert(&profile("u1", "boss@shop.test", "boss", "admin")).await.unwrap();
    assert!(is_admin(&store, Some("u1")).await);

    db.fail_select.store(true, Ordering::SeqCst);
    assert!(!is_admin(&store, Some("u1")).await);
    assert_eq!(get_user_role(&store, Some("u1")).await, None);
}
