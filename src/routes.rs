use axum::{
    Router,
    extract::{Path, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
};
use axum_extra::extract::{Form, SignedCookieJar};
use jiff::civil;
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{
    AppState,
    auth::{self, CurrentUser},
    entities::{genre, movie},
    error::{AppError, AppResult},
    models::{FormErrors, MovieForm, MovieView, is_valid_imdb_id, is_valid_slug},
    repository::SaveError,
    templates::{self, Chrome},
};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { Redirect::to("/movies") }))
        .route("/movies", get(list_movies))
        .route("/movies/imdb/{imdb_id}", get(show_remote_movie))
        .route("/movies/{slug}", get(show_movie))
        .route("/admin/movies/new", get(new_movie_form).post(create_movie))
        .route("/admin/movies/{slug}/edit", get(edit_movie_form).post(update_movie))
        .route("/login", get(login_form).post(login))
        .route("/logout", post(logout))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

fn today() -> civil::Date {
    jiff::Zoned::now().date()
}

async fn list_movies(State(state): State<AppState>, current: CurrentUser) -> AppResult<Html<String>> {
    let nav = state.movies.list_for_navbar().await?;
    let movies: Vec<MovieView> = state
        .movies
        .list_all()
        .await?
        .into_iter()
        .map(|(movie, genres)| MovieView::from_entity(movie, genres))
        .collect();

    let chrome = Chrome { user: current.user(), movies: &nav };
    Ok(Html(templates::movie_list(&chrome, &movies)))
}

async fn show_movie(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    current: CurrentUser,
) -> AppResult<Html<String>> {
    let (movie, genres) = find_movie(&state, &slug).await?;
    let view = MovieView::from_entity(movie, genres);
    ensure_can_view(&current, &view)?;

    let nav = state.movies.list_for_navbar().await?;
    let chrome = Chrome { user: current.user(), movies: &nav };
    let can_edit = current.user().is_some_and(|u| u.is_admin());
    Ok(Html(templates::movie_details(&chrome, &view, can_edit)))
}

async fn show_remote_movie(
    State(state): State<AppState>,
    Path(imdb_id): Path<String>,
    current: CurrentUser,
) -> AppResult<Html<String>> {
    if !is_valid_imdb_id(&imdb_id) {
        return Err(AppError::not_found(format!("\"{imdb_id}\" is not an IMDb id")));
    }

    let record = state.omdb.get_by_imdb_id(&imdb_id).await?;
    let view = MovieView::from_omdb(&record).ok_or_else(|| {
        AppError::new(StatusCode::BAD_GATEWAY, format!("OMDb record {imdb_id} has no release date"))
    })?;
    ensure_can_view(&current, &view)?;

    let nav = state.movies.list_for_navbar().await?;
    let chrome = Chrome { user: current.user(), movies: &nav };
    Ok(Html(templates::movie_details(&chrome, &view, false)))
}

async fn new_movie_form(State(state): State<AppState>, current: CurrentUser) -> AppResult<Response> {
    current.require_admin()?;
    render_form(&state, &current, &MovieForm::default(), &FormErrors::new(), None).await
}

async fn create_movie(
    State(state): State<AppState>,
    current: CurrentUser,
    Form(form): Form<MovieForm>,
) -> AppResult<Response> {
    let admin = current.require_admin()?;

    let valid = match form.validate(today()) {
        Ok(valid) => valid,
        Err(errors) => return render_form(&state, &current, &form, &errors, None).await,
    };

    match state.movies.save(None, &valid).await {
        Ok(movie) => {
            info!(
                slug = %movie.slug,
                user = %admin.username,
                at = %jiff::Timestamp::now(),
                "movie added"
            );
            Ok(Redirect::to(&format!("/movies/{}", movie.slug)).into_response())
        },
        Err(SaveError::SlugTaken(_)) => {
            render_form(&state, &current, &form, &slug_taken(), None).await
        },
        Err(SaveError::Database(err)) => Err(err.into()),
    }
}

async fn edit_movie_form(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    current: CurrentUser,
) -> AppResult<Response> {
    current.require_admin()?;
    let (movie, genres) = find_movie(&state, &slug).await?;
    let form = MovieForm::from_existing(&movie, genres.iter().map(|g| g.id).collect());
    render_form(&state, &current, &form, &FormErrors::new(), Some(&movie)).await
}

async fn update_movie(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    current: CurrentUser,
    Form(form): Form<MovieForm>,
) -> AppResult<Response> {
    let admin = current.require_admin()?;
    let (movie, _) = find_movie(&state, &slug).await?;

    let valid = match form.validate(today()) {
        Ok(valid) => valid,
        Err(errors) => return render_form(&state, &current, &form, &errors, Some(&movie)).await,
    };

    match state.movies.save(Some(movie.clone()), &valid).await {
        Ok(saved) => {
            info!(slug = %saved.slug, user = %admin.username, "movie updated");
            Ok(Redirect::to(&format!("/movies/{}", saved.slug)).into_response())
        },
        Err(SaveError::SlugTaken(_)) => {
            render_form(&state, &current, &form, &slug_taken(), Some(&movie)).await
        },
        Err(SaveError::Database(err)) => Err(err.into()),
    }
}

#[derive(Debug, Default, Deserialize)]
struct Credentials {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

async fn login_form(State(state): State<AppState>, current: CurrentUser) -> AppResult<Html<String>> {
    let nav = state.movies.list_for_navbar().await?;
    let chrome = Chrome { user: current.user(), movies: &nav };
    Ok(Html(templates::login_page(&chrome, "", None)))
}

async fn login(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    Form(creds): Form<Credentials>,
) -> AppResult<Response> {
    let user =
        auth::authenticate(&state.db, &creds.username, &creds.password, jiff::Timestamp::now()).await?;

    match user {
        Some(user) => Ok((jar.add(auth::session_cookie(user.id)), Redirect::to("/movies")).into_response()),
        None => {
            let nav = state.movies.list_for_navbar().await?;
            let chrome = Chrome { user: None, movies: &nav };
            let body = templates::login_page(&chrome, &creds.username, Some("Invalid credentials."));
            Ok((StatusCode::UNAUTHORIZED, Html(body)).into_response())
        },
    }
}

async fn logout(jar: SignedCookieJar) -> impl IntoResponse {
    (jar.remove(auth::expired_session_cookie()), Redirect::to("/movies"))
}

async fn find_movie(state: &AppState, slug: &str) -> AppResult<(movie::Model, Vec<genre::Model>)> {
    let not_found = || AppError::not_found(format!("No movie at \"{slug}\"."));
    if !is_valid_slug(slug) {
        return Err(not_found());
    }
    state.movies.get_by_slug(slug).await?.ok_or_else(not_found)
}

fn ensure_can_view(current: &CurrentUser, movie: &MovieView) -> AppResult<()> {
    if auth::can_view_details(current.user(), movie.rated, today()) {
        Ok(())
    } else {
        Err(AppError::forbidden())
    }
}

fn slug_taken() -> FormErrors {
    FormErrors::from([("slug", "This slug is already used by another movie.".to_string())])
}

/// Renders the admin form; a form carrying errors answers 422.
async fn render_form(
    state: &AppState,
    current: &CurrentUser,
    form: &MovieForm,
    errors: &FormErrors,
    editing: Option<&movie::Model>,
) -> AppResult<Response> {
    let nav = state.movies.list_for_navbar().await?;
    let genres = state.movies.genres().await?;
    let chrome = Chrome { user: current.user(), movies: &nav };

    let (heading, action) = match editing {
        Some(movie) => ("Edit movie", format!("/admin/movies/{}/edit", movie.slug)),
        None => ("New movie", "/admin/movies/new".to_string()),
    };
    let body = templates::movie_form(&chrome, form, errors, &genres, heading, &action);

    let status = if errors.is_empty() { StatusCode::OK } else { StatusCode::UNPROCESSABLE_ENTITY };
    Ok((status, Html(body)).into_response())
}
