mod common;

use common::{accepted_member, at, create_poll, group_poll, group_with_admin, public_poll, setup, user};
use voting_backend::{
    error::AppError,
    routes::group::Group,
    routes::poll::{OptionTally, Poll, ResultsView},
    routes::user::User,
    session::Role,
};

async fn vote_for(pool: &sqlx::SqlitePool, poll: &Poll, option_text: &str, username: &str) {
    let voter = user(pool, username, Role::User).await;
    let option = Poll::options(pool, poll.poll_id)
        .await
        .unwrap()
        .into_iter()
        .find(|o| o.option_text == option_text)
        .unwrap();
    Poll::cast_vote(pool, poll.poll_id, option.option_id, voter.user_id)
        .await
        .unwrap();
}

#[tokio::test]
async fn public_polls_are_visible_to_everyone_inside_the_window() {
    let pool = setup().await;
    let admin = user(&pool, "root", Role::Admin).await;
    let (_, group) = group_with_admin(&pool, "chess", "anna").await;
    let member = accepted_member(&pool, &group, "mia").await;
    let outsider = user(&pool, "olaf", Role::User).await;

    let poll = create_poll(&pool, &admin, public_poll("Lunch?", &["Pizza", "Sushi"])).await;

    for viewer in [&member, &outsider] {
        let visible = Poll::visible_polls_for(&pool, viewer.user_id, at(12)).await.unwrap();
        assert_eq!(visible, vec![poll.clone()]);
    }

    for hour in [9, 17] {
        let visible = Poll::visible_polls_for(&pool, outsider.user_id, at(hour)).await.unwrap();
        assert_eq!(visible.len(), 1, "window is inclusive at {hour}:00");
    }
    for hour in [8, 18] {
        let visible = Poll::visible_polls_for(&pool, outsider.user_id, at(hour)).await.unwrap();
        assert!(visible.is_empty(), "poll should be hidden at {hour}:00");
    }
}

#[tokio::test]
async fn private_polls_need_an_accepted_membership() {
    let pool = setup().await;
    let (owner, group) = group_with_admin(&pool, "chess", "anna").await;
    let member = accepted_member(&pool, &group, "mia").await;
    let applicant = user(&pool, "paul", Role::User).await;
    Group::request_join(&pool, group.group_id, applicant.user_id)
        .await
        .unwrap();
    let outsider = user(&pool, "olaf", Role::User).await;

    let poll = create_poll(&pool, &owner, group_poll("Next opening?", group.group_id, &["e4", "d4"])).await;

    let visible = Poll::visible_polls_for(&pool, member.user_id, at(12)).await.unwrap();
    assert_eq!(visible, vec![poll.clone()]);
    assert!(Poll::visible_polls_for(&pool, member.user_id, at(20)).await.unwrap().is_empty());

    for viewer in [&applicant, &outsider] {
        assert!(Poll::visible_polls_for(&pool, viewer.user_id, at(12)).await.unwrap().is_empty());
        assert!(Poll::results_eligible_polls_for(&pool, viewer.user_id).await.unwrap().is_empty());
        assert!(!poll.is_eligible(&pool, viewer.user_id).await.unwrap());
    }

    let eligible = Poll::results_eligible_polls_for(&pool, member.user_id).await.unwrap();
    assert_eq!(eligible, vec![poll]);
}

#[tokio::test]
async fn tally_zero_fills_and_sums_to_the_vote_count() {
    let pool = setup().await;
    let admin = user(&pool, "root", Role::Admin).await;
    let poll = create_poll(&pool, &admin, public_poll("Colour?", &["Red", "Blue", "Green"])).await;

    vote_for(&pool, &poll, "Red", "u1").await;
    vote_for(&pool, &poll, "Red", "u2").await;
    vote_for(&pool, &poll, "Blue", "u3").await;

    let tally = Poll::tally(&pool, poll.poll_id).await.unwrap();
    let counts: Vec<(&str, i64)> = tally.iter().map(|t| (t.option_text.as_str(), t.votes)).collect();
    assert_eq!(counts, vec![("Red", 2), ("Blue", 1), ("Green", 0)]);
    assert_eq!(tally.iter().map(|t| t.votes).sum::<i64>(), 3);

    let again = Poll::tally(&pool, poll.poll_id).await.unwrap();
    assert_eq!(tally, again);
}

#[tokio::test]
async fn red_blue_results_render_only_after_the_end() {
    let pool = setup().await;
    let admin = user(&pool, "root", Role::Admin).await;
    let poll = create_poll(&pool, &admin, public_poll("Colour?", &["Red", "Blue"])).await;

    vote_for(&pool, &poll, "Red", "u1").await;
    vote_for(&pool, &poll, "Red", "u2").await;
    vote_for(&pool, &poll, "Blue", "u3").await;

    let tally: Vec<OptionTally> = Poll::tally(&pool, poll.poll_id).await.unwrap();

    assert_eq!(
        ResultsView::render(&poll, &tally, at(16)),
        ResultsView::StillActive { ends_at: at(17) }
    );

    let ResultsView::Tallied { results } = ResultsView::render(&poll, &tally, at(18)) else {
        panic!("expected numeric results after the end time");
    };
    let lines: Vec<String> = results.iter().map(ToString::to_string).collect();
    assert_eq!(lines, vec!["Red: 2 votes (66.67%)", "Blue: 1 votes (33.33%)"]);
}

#[tokio::test]
async fn a_second_vote_on_the_same_poll_is_rejected() {
    let pool = setup().await;
    let admin = user(&pool, "root", Role::Admin).await;
    let voter = user(&pool, "vera", Role::User).await;
    let poll = create_poll(&pool, &admin, public_poll("Colour?", &["Red", "Blue"])).await;
    let options = Poll::options(&pool, poll.poll_id).await.unwrap();

    assert!(!Poll::has_voted(&pool, poll.poll_id, voter.user_id).await.unwrap());
    Poll::cast_vote(&pool, poll.poll_id, options[0].option_id, voter.user_id)
        .await
        .unwrap();
    assert!(Poll::has_voted(&pool, poll.poll_id, voter.user_id).await.unwrap());

    let err = Poll::cast_vote(&pool, poll.poll_id, options[1].option_id, voter.user_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::AlreadyVoted), "got {err:?}");
}

#[tokio::test]
async fn votes_must_name_an_option_of_the_poll() {
    let pool = setup().await;
    let admin = user(&pool, "root", Role::Admin).await;
    let voter = user(&pool, "vera", Role::User).await;
    let first = create_poll(&pool, &admin, public_poll("One?", &["a", "b"])).await;
    let second = create_poll(&pool, &admin, public_poll("Two?", &["c", "d"])).await;
    let foreign = Poll::options(&pool, second.poll_id).await.unwrap();

    let err = Poll::cast_vote(&pool, first.poll_id, foreign[0].option_id, voter.user_id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound("option")));
}

#[tokio::test]
async fn options_are_capped_at_four() {
    let pool = setup().await;
    let admin = user(&pool, "root", Role::Admin).await;
    let poll = create_poll(&pool, &admin, public_poll("Pick", &["a", "b", "c"])).await;

    let added = Poll::add_option(&pool, poll.poll_id, "  d ").await.unwrap();
    assert_eq!(added.option_text, "d");

    let err = Poll::add_option(&pool, poll.poll_id, "e").await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    let err = Poll::add_option(&pool, 999, "e").await.unwrap_err();
    assert!(matches!(err, AppError::NotFound("poll")));
    assert_eq!(Poll::options(&pool, poll.poll_id).await.unwrap().len(), 4);
}

#[tokio::test]
async fn private_polls_need_an_existing_group() {
    let pool = setup().await;
    let admin = user(&pool, "root", Role::Admin).await;

    let err = Poll::create(&pool, admin.user_id, group_poll("Lost?", 77, &["a", "b"]))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound("group")));
    assert_eq!(Poll::count(&pool).await.unwrap(), 0);
}

#[tokio::test]
async fn deleting_the_creator_removes_polls_options_and_votes() {
    let pool = setup().await;
    let (owner, group) = group_with_admin(&pool, "chess", "anna").await;
    let member = accepted_member(&pool, &group, "mia").await;
    let poll = create_poll(&pool, &owner, group_poll("Opening?", group.group_id, &["e4", "d4"])).await;
    let options = Poll::options(&pool, poll.poll_id).await.unwrap();
    Poll::cast_vote(&pool, poll.poll_id, options[0].option_id, member.user_id)
        .await
        .unwrap();

    User::delete(&pool, owner.user_id).await.unwrap();

    assert!(Poll::find_by_id(&pool, poll.poll_id).await.unwrap().is_none());
    assert!(Poll::options(&pool, poll.poll_id).await.unwrap().is_empty());
    assert!(!Poll::has_voted(&pool, poll.poll_id, member.user_id).await.unwrap());
    assert_eq!(Poll::active_voter_count(&pool).await.unwrap(), 0);
    assert!(matches!(
        Poll::tally(&pool, poll.poll_id).await.unwrap_err(),
        AppError::NotFound("poll")
    ));
}

#[tokio::test]
async fn updates_keep_the_window_ordered() {
    let pool = setup().await;
    let admin = user(&pool, "root", Role::Admin).await;
    let poll = create_poll(&pool, &admin, public_poll("Lunch?", &["a", "b"])).await;

    let updated = Poll::update(
        &pool,
        poll.poll_id,
        voting_backend::routes::poll::PollUpdate {
            question: Some("Dinner?".into()),
            end_time: Some(at(20)),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    assert_eq!(updated.question, "Dinner?");
    assert_eq!(updated.end_time, at(20));

    let err = Poll::update(
        &pool,
        poll.poll_id,
        voting_backend::routes::poll::PollUpdate {
            start_time: Some(at(21)),
            ..Default::default()
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
}

#[tokio::test]
async fn deleting_a_poll_removes_its_options_and_votes() {
    let pool = setup().await;
    let admin = user(&pool, "root", Role::Admin).await;
    let doomed = create_poll(&pool, &admin, public_poll("Colour?", &["Red", "Blue"])).await;
    let kept = create_poll(&pool, &admin, public_poll("Shape?", &["Circle", "Square"])).await;

    vote_for(&pool, &doomed, "Red", "u1").await;
    vote_for(&pool, &kept, "Square", "u2").await;
    let voter = User::find_by_username(&pool, "u1").await.unwrap().unwrap();

    Poll::delete(&pool, doomed.poll_id).await.unwrap();

    assert!(Poll::find_by_id(&pool, doomed.poll_id).await.unwrap().is_none());
    assert!(Poll::options(&pool, doomed.poll_id).await.unwrap().is_empty());
    assert!(!Poll::has_voted(&pool, doomed.poll_id, voter.user_id).await.unwrap());
    assert_eq!(Poll::active_voter_count(&pool).await.unwrap(), 1);
    assert_eq!(Poll::tally(&pool, kept.poll_id).await.unwrap()[1].votes, 1);

    let err = Poll::delete(&pool, doomed.poll_id).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound("poll")));
}
